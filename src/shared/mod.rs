pub mod countable_wrapper;
pub mod locked;

pub use countable_wrapper::CountableWrapper;
pub use locked::SharedWaitQueue;
