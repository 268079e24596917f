//! Built-in component models
//!
//! Every built-in exposes a fixed vocabulary of methods. A method is a pure
//! function from the instance's parameter snapshot to an outcome
//! distribution; the interpreter samples the distribution and charges the
//! drawn duration. Parameter reads all go through [`ParamView`], so canvas
//! overrides take effect on the next trial without touching the instance.
//!
//! Dispatch is a tagged enum rather than trait objects: the set of built-ins
//! is closed, and the interpreter treats built-in and user-defined
//! components uniformly one level up (see
//! [`ComponentBody`](crate::system::ComponentBody)).

pub mod batcher;
pub mod bitmap;
pub mod btree;
pub mod cache;
pub mod disk;
pub mod hashindex;
pub mod heapfile;
pub mod lsm;
pub mod network;
pub mod pool;
pub mod queue;
pub mod queuing;
pub mod sortedfile;

use crate::error::EvalError;
use crate::outcome::Outcomes;
use crate::params::ParamView;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// The closed set of built-in component kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuiltinKind {
    Disk,
    Cache,
    Queue,
    ResourcePool,
    BTreeIndex,
    HashIndex,
    LsmTree,
    SortedFile,
    HeapFile,
    BitmapIndex,
    NetworkLink,
    Batcher,
}

impl BuiltinKind {
    /// Resolve a component type name from an instance declaration
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "Disk" => Some(BuiltinKind::Disk),
            "Cache" => Some(BuiltinKind::Cache),
            "Queue" => Some(BuiltinKind::Queue),
            "ResourcePool" => Some(BuiltinKind::ResourcePool),
            "BTreeIndex" => Some(BuiltinKind::BTreeIndex),
            "HashIndex" => Some(BuiltinKind::HashIndex),
            "LSMTree" => Some(BuiltinKind::LsmTree),
            "SortedFile" => Some(BuiltinKind::SortedFile),
            "HeapFile" => Some(BuiltinKind::HeapFile),
            "BitmapIndex" => Some(BuiltinKind::BitmapIndex),
            "NetworkLink" => Some(BuiltinKind::NetworkLink),
            "Batcher" => Some(BuiltinKind::Batcher),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            BuiltinKind::Disk => "Disk",
            BuiltinKind::Cache => "Cache",
            BuiltinKind::Queue => "Queue",
            BuiltinKind::ResourcePool => "ResourcePool",
            BuiltinKind::BTreeIndex => "BTreeIndex",
            BuiltinKind::HashIndex => "HashIndex",
            BuiltinKind::LsmTree => "LSMTree",
            BuiltinKind::SortedFile => "SortedFile",
            BuiltinKind::HeapFile => "HeapFile",
            BuiltinKind::BitmapIndex => "BitmapIndex",
            BuiltinKind::NetworkLink => "NetworkLink",
            BuiltinKind::Batcher => "Batcher",
        }
    }

    /// Methods the kind exposes
    pub fn methods(&self) -> &'static [&'static str] {
        match self {
            BuiltinKind::Disk => &["Read", "Write", "ReadProcessWrite"],
            BuiltinKind::Cache => &["Read", "Write"],
            BuiltinKind::Queue => &["Enqueue", "Dequeue"],
            BuiltinKind::ResourcePool => &["Acquire"],
            BuiltinKind::BTreeIndex => &["Find", "Insert", "Delete"],
            BuiltinKind::HashIndex => &["Find", "Insert", "Delete"],
            BuiltinKind::LsmTree => &["Read", "Write"],
            BuiltinKind::SortedFile => &["Scan", "Find", "Insert", "Delete"],
            BuiltinKind::HeapFile => &["Scan", "Find", "Insert", "Delete"],
            BuiltinKind::BitmapIndex => &["Find", "Insert", "Delete", "Update"],
            BuiltinKind::NetworkLink => &["Transfer"],
            BuiltinKind::Batcher => &["Submit"],
        }
    }

    /// Produce the outcome distribution for one method invocation.
    ///
    /// Arguments beyond what a model consumes are ignored, matching the
    /// language's loose call convention for built-ins.
    pub fn outcomes(
        &self,
        method: &str,
        args: &[Value],
        view: &ParamView<'_>,
    ) -> Result<Outcomes<Value>, EvalError> {
        let unknown = || EvalError::UnknownMethod {
            instance: view.instance().to_string(),
            method: method.to_string(),
        };
        match self {
            BuiltinKind::Disk => match method {
                "Read" => Ok(disk::read(view)),
                "Write" => Ok(disk::write(view)),
                "ReadProcessWrite" => {
                    let extra = match args.first() {
                        Some(v) => v.as_f64()?,
                        None => 0.0,
                    };
                    Ok(disk::read_process_write(view, extra))
                }
                _ => Err(unknown()),
            },
            BuiltinKind::Cache => match method {
                "Read" => Ok(cache::read(view)),
                "Write" => Ok(cache::write(view)),
                _ => Err(unknown()),
            },
            BuiltinKind::Queue => match method {
                "Enqueue" => Ok(queue::enqueue(view)),
                "Dequeue" => Ok(queue::dequeue(view)),
                _ => Err(unknown()),
            },
            BuiltinKind::ResourcePool => match method {
                "Acquire" => Ok(pool::acquire(view)),
                _ => Err(unknown()),
            },
            BuiltinKind::BTreeIndex => match method {
                "Find" => Ok(btree::find(view)),
                "Insert" => Ok(btree::insert(view)),
                "Delete" => Ok(btree::delete(view)),
                _ => Err(unknown()),
            },
            BuiltinKind::HashIndex => match method {
                "Find" => Ok(hashindex::find(view)),
                "Insert" => Ok(hashindex::insert(view)),
                "Delete" => Ok(hashindex::delete(view)),
                _ => Err(unknown()),
            },
            BuiltinKind::LsmTree => match method {
                "Read" => Ok(lsm::read(view)),
                "Write" => Ok(lsm::write(view)),
                _ => Err(unknown()),
            },
            BuiltinKind::SortedFile => match method {
                "Scan" => Ok(sortedfile::scan(view)),
                "Find" => Ok(sortedfile::find(view)),
                "Insert" => Ok(sortedfile::insert(view)),
                "Delete" => Ok(sortedfile::delete(view)),
                _ => Err(unknown()),
            },
            BuiltinKind::HeapFile => match method {
                "Scan" => Ok(heapfile::scan(view)),
                "Find" => Ok(heapfile::find(view)),
                "Insert" => Ok(heapfile::insert(view)),
                "Delete" => Ok(heapfile::delete(view)),
                _ => Err(unknown()),
            },
            BuiltinKind::BitmapIndex => match method {
                "Find" => Ok(bitmap::find(view)),
                "Insert" => Ok(bitmap::insert(view)),
                "Delete" => Ok(bitmap::delete(view)),
                "Update" => Ok(bitmap::update(view)),
                _ => Err(unknown()),
            },
            BuiltinKind::NetworkLink => match method {
                "Transfer" => Ok(network::transfer(view)),
                _ => Err(unknown()),
            },
            BuiltinKind::Batcher => match method {
                "Submit" => Ok(batcher::submit(view)),
                _ => Err(unknown()),
            },
        }
    }
}

/// Default cap applied when models trim composed distributions
pub(crate) const DEFAULT_TRIM_BUCKETS: usize = 24;
