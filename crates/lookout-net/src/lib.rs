#![forbid(unsafe_code)]

mod client;
mod error;
mod retry;
mod timeout;
mod traits;
mod types;

#[cfg(test)]
pub(crate) use crate::traits::NetMock;
pub use crate::{
    client::HttpClient,
    error::{NetError, NetResult},
    retry::{DefaultRetryPolicy, RetryNet, RetryPolicyTrait},
    timeout::TimeoutNet,
    traits::{Net, NetExt},
    types::{Headers, NetOptions, RetryPolicy},
};
