// SPDX-License-Identifier: MIT OR Apache-2.0
//! Logical threads and their stack frames.
//!
//! A thread is a stack of frames. Only the top frame runs; frames below it
//! are suspended callers. Every frame may own a forest of sub-threads that
//! it spawned, which are advanced before the frame itself.

use crate::id::{NodeRef, ThreadId};
use std::any::Any;
use std::fmt;

/// One in-flight visit to a node
pub struct StackData {
    pub(crate) node: Option<NodeRef>,
    pub(crate) input: usize,
    pub(crate) first: bool,
    pub(crate) finished: bool,
    pub(crate) data: Option<Box<dyn Any>>,
    pub(crate) sub_threads: Vec<ThreadData>,
}

impl StackData {
    /// Create a frame that will visit `node` through `input`
    pub fn new(node: NodeRef, input: usize) -> Self {
        Self {
            node: Some(node),
            input,
            first: true,
            finished: false,
            data: None,
            sub_threads: Vec::new(),
        }
    }

    /// Node being visited, if any
    pub fn node(&self) -> Option<NodeRef> {
        self.node
    }

    /// Input the node was entered through
    pub fn input(&self) -> usize {
        self.input
    }

    /// Whether the node has not been visited yet
    pub fn is_first(&self) -> bool {
        self.first
    }

    /// Whether the node finished on its last visit
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the node left continuation data on the frame
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Threads spawned from this frame
    pub fn sub_threads(&self) -> &[ThreadData] {
        &self.sub_threads
    }
}

impl fmt::Debug for StackData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackData")
            .field("node", &self.node)
            .field("input", &self.input)
            .field("first", &self.first)
            .field("finished", &self.finished)
            .field("data", &self.data.is_some())
            .field("sub_threads", &self.sub_threads)
            .finish()
    }
}

/// A logical thread of execution
#[derive(Debug)]
pub struct ThreadData {
    pub(crate) id: ThreadId,
    pub(crate) stack: Vec<StackData>,
}

impl ThreadData {
    /// Create a thread with a single frame
    pub fn new(id: ThreadId, frame: StackData) -> Self {
        Self {
            id,
            stack: vec![frame],
        }
    }

    /// Thread ID. Sub-threads carry the ID of their root thread.
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Frames, bottom first
    pub fn stack(&self) -> &[StackData] {
        &self.stack
    }

    /// Check if the thread has no frames left
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Total number of frames in this thread and every sub-thread
    pub fn frame_count(&self) -> usize {
        self.stack
            .iter()
            .map(|frame| 1 + frame.sub_threads.iter().map(ThreadData::frame_count).sum::<usize>())
            .sum()
    }

    /// Whether any frame in this thread or its sub-threads visits `node`
    pub fn references(&self, node: &NodeRef) -> bool {
        self.stack.iter().any(|frame| {
            frame.node.as_ref() == Some(node) || frame.sub_threads.iter().any(|sub| sub.references(node))
        })
    }
}

/// What a queued request does once drained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Start a new thread
    Thread,
    /// Push a frame onto the running thread
    Stack,
}

/// A thread request captured while a node was running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadRequest {
    /// Target node
    pub node: NodeRef,
    /// Target input
    pub input: usize,
    /// Request kind
    pub kind: RequestKind,
}

impl ThreadRequest {
    /// A new-thread request
    pub fn thread(node: NodeRef, input: usize) -> Self {
        Self {
            node,
            input,
            kind: RequestKind::Thread,
        }
    }

    /// A push-stack request
    pub fn stack(node: NodeRef, input: usize) -> Self {
        Self {
            node,
            input,
            kind: RequestKind::Stack,
        }
    }
}

/// Reuse `frame` for a new visit if it has no node assigned.
///
/// Only the deepest frame on the running path is offered here; a frame
/// that still references a node is never overwritten.
pub(crate) fn try_reuse_current_frame(frame: &mut StackData, node: NodeRef, input: usize) -> bool {
    if frame.node.is_some() {
        return false;
    }

    frame.node = Some(node);
    frame.input = input;
    frame.first = true;
    frame.finished = false;
    true
}

/// Resolve the thread list reached by following `path` from `list`.
///
/// Each path entry selects a thread; the next list is the sub-thread list
/// of that thread's top frame.
pub(crate) fn sub_list<'a>(list: &'a mut Vec<ThreadData>, path: &[usize]) -> Option<&'a mut Vec<ThreadData>> {
    match path.split_first() {
        None => Some(list),
        Some((&index, rest)) => {
            let frame = list.get_mut(index)?.stack.last_mut()?;
            sub_list(&mut frame.sub_threads, rest)
        }
    }
}

/// Collapse threads reduced to a single empty frame, promoting that
/// frame's sub-threads into `list`, and recurse into everything else.
pub(crate) fn clean_list(list: &mut Vec<ThreadData>) {
    let mut index = 0;
    while index < list.len() {
        let thread = &mut list[index];
        let single = thread.stack.len() == 1;
        let orphans = match thread.stack.last_mut() {
            Some(top) if single && top.node.is_none() => {
                let orphans = std::mem::take(&mut top.sub_threads);
                thread.stack.pop();
                orphans
            }
            Some(top) => {
                clean_list(&mut top.sub_threads);
                Vec::new()
            }
            None => Vec::new(),
        };
        list.extend(orphans);
        index += 1;
    }
}

/// Frames retired by [`scrub_node`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ScrubbedFrames {
    /// Frames that referenced the node
    pub frames: usize,
    /// Of those, frames whose node had been visited and was still waiting
    pub waiting: usize,
}

/// Remove every reference to `node` from frames in `list`. Frames visiting
/// it are marked finished and lose their node, so the scheduler retires
/// them without touching the node again.
pub(crate) fn scrub_node(list: &mut [ThreadData], node: &NodeRef) -> ScrubbedFrames {
    let mut scrubbed = ScrubbedFrames::default();
    for thread in list {
        for frame in &mut thread.stack {
            if frame.node.as_ref() == Some(node) {
                if !frame.first && !frame.finished {
                    scrubbed.waiting += 1;
                }
                frame.node = None;
                frame.finished = true;
                frame.data = None;
                scrubbed.frames += 1;
            }
            let nested = scrub_node(&mut frame.sub_threads, node);
            scrubbed.frames += nested.frames;
            scrubbed.waiting += nested.waiting;
        }
    }
    scrubbed
}
