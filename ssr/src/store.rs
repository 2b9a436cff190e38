use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::request::InitialData;

/// Full application state as handed to the client for hydration.
pub type State = Map<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl Action {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

pub trait Reducer: Send + Sync {
    fn reduce(&self, state: &mut State, action: &Action);
}

/// Stores every action's payload under the action type.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyedReducer;

impl Reducer for KeyedReducer {
    fn reduce(&self, state: &mut State, action: &Action) {
        state.insert(action.kind.clone(), action.payload.clone());
    }
}

/// State container of a single request.
///
/// A store is created per request and dropped with the response; it is never
/// shared between requests.
pub struct Store {
    state: State,
    reducer: Arc<dyn Reducer>,
}

impl Store {
    /// Seeds a store with `{logged}`, then `data`, then `{urlCurrent}`; later keys win.
    pub fn for_request(
        url: &str,
        logged: bool,
        data: InitialData,
        reducer: Arc<dyn Reducer>,
    ) -> Self {
        let mut state = State::new();
        state.insert("logged".to_owned(), Value::Bool(logged));
        state.extend(data);
        state.insert("urlCurrent".to_owned(), Value::String(url.to_owned()));
        Self { state, reducer }
    }

    pub fn snapshot(&self) -> &State {
        &self.state
    }

    pub fn dispatch(&mut self, action: Action) {
        self.reducer.reduce(&mut self.state, &action);
    }

    pub fn replace(&mut self, state: State) {
        self.state = state;
    }

    pub fn into_state(self) -> State {
        self.state
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("state", &self.state).finish()
    }
}
