pub mod health;
pub mod redirect;
pub mod shorten;
pub mod user_urls;

pub use health::{HealthService, health_routes};
pub use redirect::{RedirectService, redirect_routes};
pub use shorten::{ShortenService, shorten_routes};
pub use user_urls::{UserUrlsService, user_urls_routes};
