use serde::{de::DeserializeOwned, Serialize};

use acorn_core::VersionVector;

use crate::envelope::{TangleEnvelope, VectorExchange};
use crate::transport::{TangleError, TangleTransport};

/// HTTP counterpart for a remote peer, reached through the tangle
/// reconciliation endpoints a `Grove`-backed server exposes alongside
/// the REST surface (`/tangle/{type}/vector`, `/tangle/{type}/changes`,
/// `/tangle/{type}/push`). Mirrors the teacher's block-on-or-spawn
/// pattern so `synchronize` can be called from sync or async contexts.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    type_name: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, type_name: impl Into<String>) -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            type_name: type_name.into(),
        }
    }

    fn block_on<F, R>(&self, fut: F) -> Result<R, TangleError>
    where
        F: std::future::Future<Output = Result<R, reqwest::Error>>,
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            // Already inside a runtime thread (e.g. the periodic reconciler
            // task): `Handle::block_on` would panic here, so hand the
            // blocking wait off to a dedicated thread instead.
            tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
                .map_err(|e| TangleError::Network(e.to_string()))
        } else {
            tokio::runtime::Runtime::new()
                .map_err(|e| TangleError::Network(e.to_string()))?
                .block_on(fut)
                .map_err(|e| TangleError::Network(e.to_string()))
        }
    }
}

impl<T> TangleTransport<T> for HttpTransport
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn exchange_vector(&self) -> Result<VersionVector, TangleError> {
        let url = format!("{}/tangle/{}/vector", self.base_url, self.type_name);
        let exchange: VectorExchange = self.block_on(async {
            self.client.get(url).send().await?.error_for_status()?.json().await
        })?;
        Ok(exchange.vector)
    }

    fn fetch_since(&self, since: &VersionVector) -> Result<Vec<TangleEnvelope<T>>, TangleError> {
        let url = format!("{}/tangle/{}/changes", self.base_url, self.type_name);
        let since = since.clone();
        self.block_on(async move {
            self.client.post(url).json(&since).send().await?.error_for_status()?.json().await
        })
    }

    fn push_changes(&self, envelopes: Vec<TangleEnvelope<T>>) -> Result<(), TangleError> {
        let url = format!("{}/tangle/{}/push", self.base_url, self.type_name);
        self.block_on(async move {
            self.client.post(url).json(&envelopes).send().await?.error_for_status()?;
            Ok(())
        })
    }
}
