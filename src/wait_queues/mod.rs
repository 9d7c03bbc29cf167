pub mod linked;
pub mod scan;

pub use linked::LinkedWaitQueue;
pub use scan::ScanWaitQueue;
