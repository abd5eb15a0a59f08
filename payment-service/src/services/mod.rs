pub mod basket;
pub mod checkout;
pub mod metrics;
pub mod paytr;
pub mod repository;
pub mod store;

pub use checkout::CheckoutService;
pub use metrics::{get_metrics, init_metrics};
pub use paytr::PaytrClient;
pub use repository::{CatalogRepository, OrderRepository};
pub use store::{OrderStore, PaymentOutcome, ProductCatalog, ReconcileResult};
