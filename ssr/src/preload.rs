//! Data preloading ahead of the render pass.
//!
//! Preloading runs in two phases. The [`Preloader`] first declares every
//! preload the route needs, without awaiting anything. [`Preloads::settle`]
//! then awaits all of them at once and dispatches their actions into the
//! request's store. The real render only starts after that, so it always sees
//! settled state.

use std::{error::Error, future::Future};

use futures::future::{try_join_all, BoxFuture};

use crate::{
    error::RenderingError,
    request::Location,
    store::{Action, State, Store},
};

pub type PreloadError = Box<dyn Error + Send + Sync>;

pub type PreloadFuture = BoxFuture<'static, Result<Action, PreloadError>>;

/// Declares the data a route needs before it can be rendered.
pub trait Preloader: Send + Sync {
    fn declare(&self, location: &Location, state: &State, preloads: &mut Preloads);
}

impl<F> Preloader for F
where
    F: Fn(&Location, &State, &mut Preloads) + Send + Sync,
{
    fn declare(&self, location: &Location, state: &State, preloads: &mut Preloads) {
        self(location, state, preloads)
    }
}

/// Declares nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPreload;

impl Preloader for NoPreload {
    fn declare(&self, _: &Location, _: &State, _: &mut Preloads) {}
}

#[derive(Default)]
pub struct Preloads {
    pending: Vec<PreloadFuture>,
}

impl Preloads {
    pub fn push<F>(&mut self, preload: F)
    where
        F: Future<Output = Result<Action, PreloadError>> + Send + 'static,
    {
        self.pending.push(Box::pin(preload));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Awaits every declared preload and dispatches the results in declaration order.
    ///
    /// The first rejection fails the whole set and nothing is dispatched.
    pub async fn settle(self, store: &mut Store) -> Result<usize, RenderingError> {
        let actions = try_join_all(self.pending)
            .await
            .map_err(RenderingError::PreloadRejected)?;
        let settled = actions.len();
        for action in actions {
            store.dispatch(action);
        }
        Ok(settled)
    }
}
