use std::collections::{BTreeMap, HashSet};
use std::fmt;

use log::warn;
use serde::Serialize;
use thiserror::Error;

/// Raw parameter values by name, as typed or pasted by the operator.
pub type TaskArgs = BTreeMap<String, String>;

/// What kind of value a parameter expects; drives how a front end asks for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    FilePath,
    DirPath,
    Text,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::FilePath => write!(f, "file"),
            ParamKind::DirPath => write!(f, "dir"),
            ParamKind::Text => write!(f, "text"),
        }
    }
}

/// One declared task parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    /// Question shown to the operator.
    pub prompt: &'static str,
}

/// The two-field result every task returns to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    pub success: bool,
    pub message: String,
}

impl TaskOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        TaskOutcome {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        TaskOutcome {
            success: false,
            message: message.into(),
        }
    }
}

/// A statically declared task: identity, parameter schema, entry point.
#[derive(Clone, Copy)]
pub struct TaskDescriptor {
    pub id: &'static str,
    pub title: &'static str,
    pub params: &'static [ParamSpec],
    pub entry: fn(&TaskArgs) -> TaskOutcome,
}

impl fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl TaskDescriptor {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Declared parameters with no non-blank value in `args`.
    pub fn unset_params<'a>(&'a self, args: &TaskArgs) -> impl Iterator<Item = &'a ParamSpec> + 'a {
        let set: HashSet<String> = args
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, _)| k.clone())
            .collect();
        self.params.iter().filter(move |p| !set.contains(p.name))
    }

    /// Run the task.  Names the task does not declare are ignored.
    pub fn run(&self, args: &TaskArgs) -> TaskOutcome {
        for name in args.keys() {
            if self.param(name).is_none() {
                warn!("task '{}' has no parameter '{name}', ignoring it", self.id);
            }
        }
        (self.entry)(args)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("task id '{0}' is registered twice")]
    DuplicateId(&'static str),
}

/// The set of tasks a front end can offer, in registration order.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    tasks: Vec<TaskDescriptor>,
}

#[derive(Debug, Default)]
pub struct TaskRegistryBuilder {
    tasks: Vec<TaskDescriptor>,
}

impl TaskRegistryBuilder {
    pub fn register(mut self, task: TaskDescriptor) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn build(self) -> Result<TaskRegistry, RegistryError> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id) {
                return Err(RegistryError::DuplicateId(task.id));
            }
        }
        Ok(TaskRegistry { tasks: self.tasks })
    }
}

impl TaskRegistry {
    pub fn builder() -> TaskRegistryBuilder {
        TaskRegistryBuilder::default()
    }

    /// Every task shipped with this crate.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::builder()
            .register(super::top_customers::descriptor())
            .build()
    }

    pub fn get(&self, id: &str) -> Option<&TaskDescriptor> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
