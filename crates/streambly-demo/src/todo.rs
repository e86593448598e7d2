#![forbid(unsafe_code)]

//! Todo list app, with a synchronous initializer and one that loads its
//! starting list from a JSON document delivered later.

use futures::channel::oneshot;
use serde::{Deserialize, Serialize};
use streambly::{BoxError, Handle, Mutation, Start, Started};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoList {
    pub todos: Vec<Todo>,
    #[serde(default)]
    pub next_id: u32,
}

const IDS_EXHAUSTED: &str = "todo id space exhausted";

impl TodoList {
    /// Move `next_id` past every existing id.
    fn normalized(mut self) -> Result<Self, BoxError> {
        if let Some(max) = self.todos.iter().map(|t| t.id).max() {
            let floor = max.checked_add(1).ok_or(IDS_EXHAUSTED)?;
            self.next_id = self.next_id.max(floor);
        }
        Ok(self)
    }

    /// Append a todo under a fresh id.
    fn push(&mut self, title: String, done: bool) -> Result<(), BoxError> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(IDS_EXHAUSTED)?;
        self.todos.push(Todo { id, title, done });
        Ok(())
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.todos.iter().filter(|t| !t.done).count()
    }
}

#[derive(Debug, Clone)]
pub struct TodoApi {
    handle: Handle<TodoList>,
}

impl TodoApi {
    /// Append a todo. `Unchanged` once the id space is used up.
    pub fn add(&self, title: impl Into<String>) -> Mutation {
        let title = title.into();
        self.handle.modify(|list| {
            if let Err(err) = list.push(title, false) {
                warn!(target: "streambly_demo", %err, "todo not added");
            }
        })
    }

    /// Flip `done` on the todo with `id`. `Unchanged` if there is none.
    pub fn toggle(&self, id: u32) -> Mutation {
        self.handle.modify(|list| {
            if let Some(todo) = list.todos.iter_mut().find(|t| t.id == id) {
                todo.done = !todo.done;
            }
        })
    }

    pub fn remove(&self, id: u32) -> Mutation {
        self.handle.modify(|list| list.todos.retain(|t| t.id != id))
    }
}

/// Synchronous initializer: the seed is the starting list.
///
/// # Errors
///
/// Fails if the seed already holds the largest possible id.
pub fn todos(
    handle: Handle<TodoList>,
    seed: TodoList,
    (): (),
) -> Result<Start<TodoList, TodoApi>, BoxError> {
    Ok(Start::ready(Started::new(seed.normalized()?, TodoApi { handle })))
}

/// Asynchronous initializer: waits for a JSON document and starts from it.
/// Todos in the seed are appended after the loaded ones.
///
/// # Errors
///
/// The pending start fails if the document never arrives, is malformed, or
/// leaves no room for new ids.
pub fn loaded_todos(
    handle: Handle<TodoList>,
    seed: TodoList,
    document: oneshot::Receiver<String>,
) -> Result<Start<TodoList, TodoApi>, BoxError> {
    Ok(Start::pending(async move {
        let raw = document.await?;
        let mut list: TodoList = serde_json::from_str(&raw)?;
        info!(target: "streambly_demo", loaded = list.todos.len(), "todo list loaded");
        list = list.normalized()?;
        for todo in seed.todos {
            list.push(todo.title, todo.done)?;
        }
        Ok::<_, BoxError>(Started::new(list, TodoApi { handle }))
    }))
}
