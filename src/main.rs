use clap::{Parser, Subcommand, ValueEnum};

use hostel_meals::api::dto::{Category, Meal, SortOrder};
use hostel_meals::dashboard::{self, Overview, OverviewController};
use hostel_meals::display::{
    format_date, format_price, format_timestamp, image_or_placeholder, star_rating,
};
use hostel_meals::meals::{
    CategoryTabsController, MealDetailController, MealFilters, MealListController,
};
use hostel_meals::nav::NavigationController;
use hostel_meals::upcoming::{UpcomingAdminController, UpcomingMealForm, UpcomingMealsController};
use hostel_meals::{AppState, Level, Notice};

#[derive(Parser)]
#[command(name = "hostel-meals")]
#[command(about = "Browse, like, request and review hostel meals")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Sort {
    Asc,
    Desc,
}

#[derive(Subcommand)]
enum Command {
    /// Browse the catalog
    Meals {
        #[arg(long, default_value = "")]
        search: String,
        /// Breakfast, Lunch, Dinner or All
        #[arg(long, default_value = "All")]
        category: String,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long, value_enum)]
        sort: Option<Sort>,
        /// Number of pages to scroll through
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Home-page strip for one category tab
    Tabs {
        #[arg(default_value = "All")]
        tab: String,
    },
    /// One meal with its reviews
    Meal { id: String },
    Like { id: String },
    Request { id: String },
    Review { id: String, text: String },
    /// Upcoming meals as a member sees them
    Upcoming,
    UpcomingLike { id: String },
    /// Upcoming meals ranked by likes
    AdminUpcoming,
    AddUpcoming {
        #[arg(long)]
        title: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        image: String,
        #[arg(long)]
        ingredients: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        price: String,
        #[arg(long)]
        publish_date: String,
        #[arg(long)]
        distributor_name: String,
    },
    Publish { id: String },
    /// Dashboard counters and chart series
    Overview,
    /// Navigation links for the current session
    Nav,
    SignOut,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "hostel_meals=debug,reqwest=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let args = Args::parse();
    let state = AppState::init()?;
    tracing::debug!(base_url = %state.config.api.base_url, "client ready");

    match args.command {
        Command::Meals {
            search,
            category,
            min_price,
            max_price,
            sort,
            pages,
        } => {
            let list = MealListController::new(&state);
            let filters = MealFilters {
                search,
                category: Category::from_tab(&category),
                min_price,
                max_price,
                sort: sort.map(|s| match s {
                    Sort::Asc => SortOrder::Asc,
                    Sort::Desc => SortOrder::Desc,
                }),
            };
            report(list.update_filters(filters).await);
            for _ in 1..pages {
                if let Some(n) = list.load_more().await {
                    report(Some(n));
                    break;
                }
            }
            let snapshot = list.snapshot();
            snapshot.meals.iter().for_each(print_meal);
            println!(
                "{} meals, page {}{}",
                snapshot.meals.len(),
                snapshot.page,
                if snapshot.has_more { ", more available" } else { "" }
            );
        }
        Command::Tabs { tab } => {
            let tabs = CategoryTabsController::new(&state);
            report(tabs.select(&tab).await);
            let snapshot = tabs.snapshot();
            println!("[{}]", snapshot.active);
            snapshot.meals.iter().for_each(print_meal);
        }
        Command::Meal { id } => {
            let detail = MealDetailController::new(&state, id);
            detail.load().await.into_iter().for_each(|n| report(Some(n)));
            let s = detail.snapshot();
            match &s.meal {
                Some(meal) => {
                    print_meal(meal);
                    println!("  image: {}", image_or_placeholder(meal.image.as_deref()));
                    if let Some(d) = &meal.description {
                        println!("  {d}");
                    }
                    println!(
                        "  likes: {}{}  requested: {}",
                        s.like_count,
                        if s.liked { " (you)" } else { "" },
                        s.requested
                    );
                }
                None => println!("Meal not found."),
            }
            println!("{} reviews", s.review_count());
            for r in &s.reviews {
                println!(
                    "  {} ({}): {}",
                    r.user_name,
                    format_timestamp(r.created_at.as_deref()),
                    r.comment
                );
            }
        }
        Command::Like { id } => {
            let detail = MealDetailController::new(&state, id);
            detail.load().await.into_iter().for_each(|n| report(Some(n)));
            report(detail.like().await);
        }
        Command::Request { id } => {
            let detail = MealDetailController::new(&state, id);
            detail.check_requested().await;
            report(detail.request_meal().await);
        }
        Command::Review { id, text } => {
            let detail = MealDetailController::new(&state, id);
            detail.set_draft(text);
            report(detail.post_review().await);
        }
        Command::Upcoming => {
            let upcoming = UpcomingMealsController::new(&state);
            upcoming.load().await.into_iter().for_each(|n| report(Some(n)));
            for meal in &upcoming.snapshot().meals {
                println!(
                    "{}  {}  likes {}  publishes {}{}",
                    meal.id,
                    meal.title,
                    meal.likes,
                    format_date(meal.publish_date.as_deref()),
                    if upcoming.can_like(&meal.id) { "  [can like]" } else { "" }
                );
            }
        }
        Command::UpcomingLike { id } => {
            let upcoming = UpcomingMealsController::new(&state);
            upcoming.load().await.into_iter().for_each(|n| report(Some(n)));
            report(upcoming.like(&id).await);
        }
        Command::AdminUpcoming => {
            let admin = UpcomingAdminController::new(&state);
            report(admin.load().await);
            for meal in &admin.snapshot().meals {
                println!("{:>4}  {}  {}", meal.likes, meal.id, meal.title);
            }
        }
        Command::AddUpcoming {
            title,
            category,
            image,
            ingredients,
            description,
            price,
            publish_date,
            distributor_name,
        } => {
            let admin = UpcomingAdminController::new(&state);
            admin.set_form(UpcomingMealForm {
                title,
                category,
                image,
                ingredients,
                description,
                price,
                publish_date,
                distributor_name,
            });
            report(admin.create().await);
        }
        Command::Publish { id } => {
            let admin = UpcomingAdminController::new(&state);
            report(admin.publish(&id).await);
        }
        Command::Overview => {
            let overview = OverviewController::new(&state);
            report(overview.load().await);
            if let Overview::Loaded(stats) = overview.snapshot() {
                for card in dashboard::cards(&stats) {
                    println!("{:<14} {:>6}  {}", card.label, card.value, card.color);
                }
                for p in dashboard::likes_series(&stats) {
                    println!("likes    {:<24} {}", p.label, p.value);
                }
                for p in dashboard::monthly_series(&stats) {
                    println!("requests {:<24} {}", p.label, p.value);
                }
            }
        }
        Command::Nav => {
            let nav = NavigationController::new(&state);
            let view = nav.view();
            for link in view.links {
                println!("{:<16} {}", link.label, link.path);
            }
            if let Some(profile) = view.profile {
                println!("{} ({}) -> {}", profile.name, profile.avatar, profile.dashboard);
            }
        }
        Command::SignOut => {
            let nav = NavigationController::new(&state);
            match nav.sign_out().await {
                Some(path) => println!("redirect {path}"),
                None => println!("sign out failed"),
            }
        }
    }

    Ok(())
}

fn print_meal(meal: &Meal) {
    println!(
        "{}  {}  {}  {}  {}",
        meal.id,
        meal.title,
        format_price(meal.price),
        star_rating(meal.rating),
        format_timestamp(meal.posted())
    );
}

fn report(notice: Option<Notice>) {
    let Some(n) = notice else { return };
    let level = match n.level {
        Level::Success => "ok",
        Level::Info => "info",
        Level::Warning => "warn",
        Level::Error => "error",
    };
    if n.text.is_empty() {
        eprintln!("[{level}] {}", n.title);
    } else {
        eprintln!("[{level}] {}: {}", n.title, n.text);
    }
}
