pub mod http;

pub use http::{HttpClient, HttpClientError, HttpResponse, ReqwestHttpClient};
