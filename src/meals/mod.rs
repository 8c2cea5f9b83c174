pub mod detail;
pub mod list;
pub mod tabs;

pub use detail::{MealDetailController, MealDetailState};
pub use list::{MealFilters, MealListController, MealListState, PageTicket};
pub use tabs::{CategoryTabsController, TabsState, TABS};
