pub use sniffer::Sniffer;

mod sniffer;
