mod default_loader;
mod file_loader;
mod http_loader;
mod options;
mod range_reader;

pub use default_loader::DefaultLoader;
pub use file_loader::FileLoader;
pub use http_loader::HttpLoader;
pub use options::{LoaderOptions, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use range_reader::{read_i32_le, read_u64_le, ByteRange, FetchResponse, RangeLoader};
pub(crate) use range_reader::slice_range;
