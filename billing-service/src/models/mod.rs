//! Domain models for billing-service.

mod invoice;
mod invoice_item;
mod payment;

pub use invoice::{CreateInvoice, Invoice, InvoiceStatus, ListInvoicesFilter};
pub use invoice_item::{subtotal_of, validate_items, CreateInvoiceItem, InvoiceItem};
pub use payment::{CreatePayment, Payment};
