pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const NAME_MAX_LENGTH: usize = 200;
pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Query values accepted as "on" for boolean recipe filters.
pub const TRUE_VALUES: &[&str] = &["1", "true", "True"];

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

/// `(name, slug, color)` of the tags every fresh deployment starts with.
pub const DEFAULT_TAGS: &[(&str, &str, &str)] = &[
    ("Breakfast", "breakfast", "#E26C2D"),
    ("Lunch", "lunch", "#00FF00"),
    ("Dinner", "dinner", "#3B2FFF"),
    ("Supper", "supper", "#8100EA"),
];
