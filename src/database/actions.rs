mod collections;
mod follows;
mod ingredients;
mod recipes;
mod shopping_list;
mod tags;
mod users;

pub use collections::*;
pub use follows::*;
pub use ingredients::*;
pub use recipes::*;
pub use shopping_list::*;
pub use tags::*;
pub use users::*;
