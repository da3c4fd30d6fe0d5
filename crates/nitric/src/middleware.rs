//! Middleware composition.
//!
//! A [`Middleware`] receives a context and the [`Handler`] for the rest of the
//! chain. It can inspect or modify the context, call `next` to continue, or
//! return early to short-circuit everything after it.
//!
//! [`compose`] turns an ordered list of middleware into a single middleware.
//! The composed chain is open-ended: whatever `next` it is invoked with runs
//! after its last link, so composed chains nest:
//!
//! ```rust
//! use nitric::middleware::{compose, invoke, middleware};
//!
//! # tokio_test::block_on(async {
//! let push = |n: i32| {
//!     middleware(move |mut log: Vec<i32>, next| async move {
//!         log.push(n);
//!         next(log).await
//!     })
//! };
//!
//! let chain = compose([compose([push(1), push(2)]), compose([push(3)])]);
//! let log = invoke(&chain, Vec::new()).await.unwrap();
//! assert_eq!(log, vec![1, 2, 3]);
//! # });
//! ```
//!
//! The engine is generic over the context type, so the same code serves HTTP
//! routes, subscriptions, schedules and any user type.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

/// A terminal step: takes a context and produces the (possibly updated) context.
pub type Handler<C> = Arc<dyn Fn(C) -> BoxFuture<'static, anyhow::Result<C>> + Send + Sync>;

/// A chain step: takes a context and the handler for the rest of the chain.
pub type Middleware<C> =
    Arc<dyn Fn(C, Handler<C>) -> BoxFuture<'static, anyhow::Result<C>> + Send + Sync>;

/// Wrap an async function as a [`Handler`].
pub fn handler<C, F, Fut>(f: F) -> Handler<C>
where
    C: Send + 'static,
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<C>> + Send + 'static,
{
    Arc::new(move |ctx: C| f(ctx).boxed())
}

/// Wrap an async function as a [`Middleware`].
pub fn middleware<C, F, Fut>(f: F) -> Middleware<C>
where
    C: Send + 'static,
    F: Fn(C, Handler<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<C>> + Send + 'static,
{
    Arc::new(move |ctx: C, next: Handler<C>| f(ctx, next).boxed())
}

/// The no-op handler: returns the context unchanged.
pub fn identity<C: Send + 'static>() -> Handler<C> {
    handler(|ctx: C| async move { Ok(ctx) })
}

/// Lift a handler into middleware that runs the handler and then continues
/// the chain with its output.
pub fn from_handler<C: Send + 'static>(handler: Handler<C>) -> Middleware<C> {
    middleware(move |ctx: C, next: Handler<C>| {
        let handler = Arc::clone(&handler);
        async move {
            let ctx = handler(ctx).await?;
            next(ctx).await
        }
    })
}

/// Invoke a middleware with the identity handler as its `next`.
pub async fn invoke<C: Send + 'static>(middleware: &Middleware<C>, ctx: C) -> anyhow::Result<C> {
    middleware(ctx, identity()).await
}

/// Compose middleware into a single middleware that runs them in order.
///
/// Composing nothing yields a pass-through that simply calls `next`.
pub fn compose<C, I>(middleware: I) -> Middleware<C>
where
    C: Send + 'static,
    I: IntoIterator<Item = Middleware<C>>,
{
    let links: Vec<Middleware<C>> = middleware.into_iter().collect();
    if links.is_empty() {
        return Arc::new(|ctx: C, next: Handler<C>| next(ctx));
    }

    let chain = Arc::new(Chain { links });
    Arc::new(move |ctx: C, next: Handler<C>| Arc::clone(&chain).call(0, ctx, next))
}

/// Links of a composed chain, stored in execution order.
///
/// The successor of link `i` is link `i + 1`; the successor of the last link
/// is the `next` the chain was invoked with. A chain is shared by every
/// invocation and never mutated, so concurrent invocations each carry their
/// own tail.
struct Chain<C> {
    links: Vec<Middleware<C>>,
}

impl<C: Send + 'static> Chain<C> {
    fn call(
        self: Arc<Self>,
        index: usize,
        ctx: C,
        tail: Handler<C>,
    ) -> BoxFuture<'static, anyhow::Result<C>> {
        let Some(fun) = self.links.get(index).cloned() else {
            return tail(ctx);
        };

        let next: Handler<C> = Arc::new(move |ctx: C| {
            Arc::clone(&self).call(index + 1, ctx, Arc::clone(&tail))
        });
        fun(ctx, next)
    }
}
