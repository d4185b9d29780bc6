pub mod receipt;
pub mod user;

pub use receipt::{
    parse_float, AnalysisOutcome, AnalysisResult, LineItem, Merchant, Payment, ReceiptSummary,
    Scalar, Totals, Transaction,
};
pub use user::{PublicUser, User};
