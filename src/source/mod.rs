// Network source abstraction: the fetch primitive the cache store pulls assets through.

pub mod http_source;
pub mod traits;
