pub mod transaction;

pub use transaction::{
    parse_raw_transactions, Dimension, RawNumber, RawText, RawTransaction, TransactionRecord, ValueField,
};
