pub mod api;
pub mod clock;
pub mod error;
pub mod filter;
pub mod ids;
pub mod ops;
pub mod request;
pub mod schema;
pub mod task;
pub mod value;

pub use api::*;
pub use clock::*;
pub use error::{TabulaError, TabulaResult};
pub use filter::*;
pub use ids::*;
pub use ops::*;
pub use request::*;
pub use schema::*;
pub use task::*;
pub use value::*;
