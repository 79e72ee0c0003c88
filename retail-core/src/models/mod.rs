pub mod customer;
pub mod invoice;
pub mod payment;
pub mod product;
pub mod product_return;

pub use customer::Customer;
pub use invoice::{Invoice, InvoiceItem};
pub use payment::Payment;
pub use product::{Product, ProductHistory};
pub use product_return::ProductReturn;
