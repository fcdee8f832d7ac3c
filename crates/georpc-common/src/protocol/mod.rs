pub mod discovery;
pub mod error;
pub mod methods;
pub mod requests;
pub mod responses;


pub use discovery::{GetServersRequest, GetServersResponse, Server};
pub use error::{GeoRpcError, Result};
pub use methods::{GeoMethod, GEO_SERVICE};
pub use requests::{MethodName, Request, RequestId, RpcArgs};
pub use responses::{Response, RpcResult};
