use futures::{Future, Poll};

use crate::Error;

/// Future type returned by the gateway and its collaborators.
pub type BoxFuture<T> = Box<dyn Future<Item = T, Error = Error> + Send + 'static>;

/// Two consecutive stages of an operation.
#[derive(Debug)]
pub enum Phase<A, B> {
    A(A),
    B(B),
}
impl<A, B> Future for Phase<A, B>
where
    A: Future<Error = Error>,
    B: Future<Error = Error>,
{
    type Item = Phase<A::Item, B::Item>;
    type Error = Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        match self {
            Phase::A(f) => track!(f.poll()).map(|t| t.map(Phase::A)),
            Phase::B(f) => track!(f.poll()).map(|t| t.map(Phase::B)),
        }
    }
}
