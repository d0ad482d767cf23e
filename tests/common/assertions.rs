//! Custom assertion macros
//!
//! Shorthands for the checks the sync tests repeat most.

/// Assert that a result is ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert the ids of a cached list view, in order
#[macro_export]
macro_rules! assert_view_ids {
    ($view:expr, [$($id:expr),* $(,)?]) => {{
        let view = $view.expect("view is cached");
        let ids: Vec<&str> = view.data.iter().map(|item| item.id.as_str()).collect();
        let expected: Vec<&str> = vec![$($id),*];
        pretty_assertions::assert_eq!(ids, expected);
    }};
}

/// Assert that a view is absent or does not contain `id`
#[macro_export]
macro_rules! assert_view_lacks {
    ($view:expr, $id:expr) => {{
        if let Some(view) = $view {
            assert!(
                view.data.iter().all(|item| item.id != $id),
                "Expected view not to contain '{}'",
                $id
            );
        }
    }};
}
