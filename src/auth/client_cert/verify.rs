use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use hyper::http::request::Parts;

use crate::auth::BoxError;
use crate::tls::PeerCertificate;

/// Resolves the identity behind a client certificate.
///
/// `Ok(Some(identity))` authenticates the request, `Ok(None)` rejects the certificate
/// and `Err(_)` reports a fault in the verification itself.
#[cfg_attr(test, mockall::automock(type Identity = String;))]
#[async_trait]
pub trait Verify: Send + Sync {
    type Identity: Send + 'static;

    async fn verify(
        &self,
        certificate: &PeerCertificate,
    ) -> Result<Option<Self::Identity>, BoxError>;
}

/// Same as [`Verify`], with the request head passed first.
#[cfg_attr(test, mockall::automock(type Identity = String;))]
#[async_trait]
pub trait VerifyWithRequest: Send + Sync {
    type Identity: Send + 'static;

    async fn verify_with_request(
        &self,
        parts: &Parts,
        certificate: &PeerCertificate,
    ) -> Result<Option<Self::Identity>, BoxError>;
}

pub struct VerifyFn<F, Fut> {
    f: F,
    _future: PhantomData<fn() -> Fut>,
}

/// Adapts an async closure taking the certificate into a [`Verify`] callback.
pub fn verify_fn<F, Fut, I>(f: F) -> VerifyFn<F, Fut>
where
    F: Fn(PeerCertificate) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<I>, BoxError>> + Send,
    I: Send + 'static,
{
    VerifyFn {
        f,
        _future: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, I> Verify for VerifyFn<F, Fut>
where
    F: Fn(PeerCertificate) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<I>, BoxError>> + Send,
    I: Send + 'static,
{
    type Identity = I;

    async fn verify(&self, certificate: &PeerCertificate) -> Result<Option<I>, BoxError> {
        (self.f)(certificate.clone()).await
    }
}

pub struct VerifyWithRequestFn<F, Fut> {
    f: F,
    _future: PhantomData<fn() -> Fut>,
}

/// Adapts an async closure taking the request head and the certificate into a
/// [`VerifyWithRequest`] callback.
pub fn verify_with_request_fn<F, Fut, I>(f: F) -> VerifyWithRequestFn<F, Fut>
where
    F: Fn(Parts, PeerCertificate) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<I>, BoxError>> + Send,
    I: Send + 'static,
{
    VerifyWithRequestFn {
        f,
        _future: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, I> VerifyWithRequest for VerifyWithRequestFn<F, Fut>
where
    F: Fn(Parts, PeerCertificate) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<I>, BoxError>> + Send,
    I: Send + 'static,
{
    type Identity = I;

    async fn verify_with_request(
        &self,
        parts: &Parts,
        certificate: &PeerCertificate,
    ) -> Result<Option<I>, BoxError> {
        (self.f)(parts.clone(), certificate.clone()).await
    }
}
