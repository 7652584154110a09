// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cooperative thread scheduling.
//!
//! The family root owns a [`Scheduler`]: the forest of logical threads plus
//! the cursor naming the thread currently being advanced. Nodes never touch
//! the forest directly. Everything they request while running is queued on
//! the family and drained once they return, so the forest is only ever
//! modified by the scheduler itself.
//!
//! New threads started while another thread is running become sub-threads
//! of the running frame. Outside of an update, a new thread runs
//! immediately for as long as it keeps making progress, bounded by the
//! safety timer.

use crate::context::NodeContext;
use crate::director::Director;
use crate::id::{NodeRef, ThreadId};
use crate::thread::{clean_list, sub_list, try_reuse_current_frame, RequestKind, StackData, ThreadData, ThreadRequest};
use std::any::Any;
use std::time::{Duration, Instant};

/// Result of running a node once
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeOutcome {
    pub not_finished: bool,
    pub latent: bool,
}

/// Thread forest and execution cursor of a family root
#[derive(Debug)]
pub struct Scheduler {
    pub(crate) threads: Vec<ThreadData>,
    cursor: Vec<usize>,
    pub(crate) next_thread_id: u32,
    immediate_mode: bool,
    safety_timer: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(crate::config::default_safety_timer())
    }
}

impl Scheduler {
    /// Create an empty scheduler
    pub fn new(safety_timer: Duration) -> Self {
        Self {
            threads: Vec::new(),
            cursor: Vec::new(),
            next_thread_id: 0,
            immediate_mode: false,
            safety_timer,
        }
    }

    /// Drop every thread
    pub fn clear(&mut self) {
        self.threads.clear();
        self.cursor.clear();
        self.immediate_mode = false;
    }

    /// Wall-clock budget of one immediate execution run
    pub fn safety_timer(&self) -> Duration {
        self.safety_timer
    }

    fn thread_mut(&mut self, path: &[usize]) -> Option<&mut ThreadData> {
        let (&index, list_path) = path.split_last()?;
        sub_list(&mut self.threads, list_path)?.get_mut(index)
    }

    fn frame_mut(&mut self, path: &[usize], stack_index: usize) -> Option<&mut StackData> {
        self.thread_mut(path)?.stack.get_mut(stack_index)
    }

    fn allocate_id(&mut self) -> ThreadId {
        let id = ThreadId(self.next_thread_id);
        self.next_thread_id = self.next_thread_id.wrapping_add(1);
        id
    }

    /// Advance every root thread once
    fn update(&mut self, host: &mut Director, sim_delta: f32, delta: f32) {
        let mut index = 0;
        while index < self.threads.len() {
            self.cursor = vec![index];
            self.update_thread(host, sim_delta, delta);
            if self.threads.get(index).is_some_and(ThreadData::is_empty) {
                self.threads.remove(index);
            } else {
                index += 1;
            }
        }
        self.cursor.clear();
        clean_list(&mut self.threads);
    }

    /// Start a thread on `node`.
    ///
    /// The cursor is walked down to the deepest running frame. If that
    /// frame has no node left it is reused; otherwise the new thread joins
    /// the sub-threads of the frame the walk stopped at, or the root forest
    /// when nothing is running.
    fn begin_thread(&mut self, host: &mut Director, node: NodeRef, input: usize, immediate: bool) -> ThreadId {
        let depth = self.cursor.len();
        let mut level = 0;
        let mut reused = None;
        let mut running = true;

        // Walk down the running path.
        loop {
            let index = match self.cursor.get(level) {
                Some(&index) => index,
                None => break,
            };
            let path = self.cursor[..level].to_vec();
            let Some(thread) = sub_list(&mut self.threads, &path).and_then(|list| list.get_mut(index)) else {
                running = false;
                break;
            };
            let id = thread.id;
            let Some(top) = thread.stack.last_mut() else {
                running = false;
                break;
            };
            if level + 1 == depth && try_reuse_current_frame(top, node, input) {
                reused = Some(id);
                break;
            }
            level += 1;
        }

        if let Some(id) = reused {
            return id;
        }

        let root_id = self
            .cursor
            .first()
            .and_then(|&index| self.threads.get(index))
            .map(|thread| thread.id);
        let id = match (level, root_id) {
            (0, _) | (_, None) => self.allocate_id(),
            (_, Some(id)) => id,
        };

        let list_path = self.cursor[..level].to_vec();
        let Some(list) = sub_list(&mut self.threads, &list_path) else {
            tracing::error!("Thread cursor {:?} does not resolve", list_path);
            return id;
        };
        list.push(ThreadData::new(id, StackData::new(node, input)));
        let new_index = list.len() - 1;

        let run_now = immediate
            && running
            && host.started
            && !self.immediate_mode
            && !host.family.is_debugging();
        if run_now {
            self.cursor.truncate(level);
            self.cursor.push(new_index);
            self.run_immediate(host, true);
            self.cursor.truncate(level);
        }
        id
    }

    /// Push a frame for `node` onto the thread under the cursor
    fn push_stack(&mut self, host: &mut Director, node: NodeRef, input: usize) {
        if self.cursor.is_empty() {
            self.begin_thread(host, node, input, true);
            return;
        }

        let path = self.cursor.clone();
        let Some(thread) = self.thread_mut(&path) else {
            tracing::error!("Thread cursor {:?} does not resolve", path);
            return;
        };
        thread.stack.push(StackData::new(node, input));

        if host.started && !self.immediate_mode && !host.family.is_debugging() {
            self.run_immediate(host, false);
            self.cursor = path;
        }
    }

    /// Keep advancing the thread under the cursor while it makes progress
    /// or until the safety timer runs out
    fn run_immediate(&mut self, host: &mut Director, erase_empty: bool) {
        let path = self.cursor.clone();
        let Some((&index, list_path)) = path.split_last() else {
            return;
        };
        let family = host.family.clone();
        let started = Instant::now();
        self.immediate_mode = true;

        loop {
            if let Some(notifier) = family.notifier() {
                notifier.update(family.is_debugging(), family.should_step());
            }

            self.cursor.clone_from(&path);
            let mut continued = self.update_thread(host, 0.0, 0.0);
            self.cursor.clone_from(&path);

            match sub_list(&mut self.threads, list_path) {
                Some(list) => match list.get_mut(index) {
                    Some(thread) if !thread.stack.is_empty() => {
                        if let Some(top) = thread.stack.last_mut() {
                            clean_list(&mut top.sub_threads);
                        }
                    }
                    Some(_) => {
                        if erase_empty {
                            list.remove(index);
                        }
                        continued = false;
                    }
                    None => continued = false,
                },
                None => continued = false,
            }

            family.set_should_step(false);
            if !continued {
                break;
            }
            if started.elapsed() > self.safety_timer {
                tracing::debug!("Immediate execution stopped by the safety timer");
                break;
            }
        }

        self.immediate_mode = false;
    }

    /// Advance the thread under the cursor once. Returns whether any
    /// progress was made.
    fn update_thread(&mut self, host: &mut Director, sim_delta: f32, delta: f32) -> bool {
        let path = self.cursor.clone();
        let depth = path.len();
        let Some(stack_index) = self
            .thread_mut(&path)
            .and_then(|thread| thread.stack.len().checked_sub(1))
        else {
            return false;
        };
        let family = host.family.clone();
        let mut continued = false;

        // Sub-threads of the running frame go first.
        let mut sub = 0;
        while self
            .frame_mut(&path, stack_index)
            .is_some_and(|frame| sub < frame.sub_threads.len())
        {
            self.cursor.truncate(depth);
            self.cursor.push(sub);
            continued |= self.update_thread(host, sim_delta, delta);
            self.cursor.truncate(depth);

            let removed = match self.frame_mut(&path, stack_index) {
                Some(frame) if frame.sub_threads.get(sub).is_some_and(ThreadData::is_empty) => {
                    frame.sub_threads.remove(sub);
                    true
                }
                _ => false,
            };
            if !removed {
                sub += 1;
            }
        }

        let runnable = !family.is_debugging() || family.should_step();
        let visit = self.frame_mut(&path, stack_index).and_then(|frame| {
            if !runnable || frame.finished {
                return None;
            }
            let node = frame.node?;
            let first = frame.first;
            frame.first = false;
            Some((node, frame.input, first, frame.data.take()))
        });

        if let Some((node, input, first, mut data)) = visit {
            family.set_queueing(true);
            let outcome = host.execute_node(node, sim_delta, delta, input, first, &mut data);
            let finished = outcome.map_or(true, |outcome| !outcome.not_finished);
            if let Some(frame) = self.frame_mut(&path, stack_index) {
                frame.finished = finished;
                frame.data = data;
            }

            if let Some(outcome) = outcome {
                if !outcome.latent || finished {
                    continued = true;
                }
                let outputs = host.fire_outputs(node);
                host.process_updated_node(node, first, continued, input, &outputs);
            }
            family.set_queueing(false);

            let requests = family.take_queue();
            if !requests.is_empty() {
                continued |= self.immediate_mode;
            }
            for request in requests {
                self.cursor.clone_from(&path);
                self.dispatch(host, request, true);
            }
            self.cursor.clone_from(&path);

            if let Some(frame) = self.frame_mut(&path, stack_index) {
                if frame.finished {
                    if frame.data.take().is_some() {
                        tracing::error!(
                            "Continuation data was not released after node {} finished",
                            node.node
                        );
                    }
                    frame.node = None;
                }
            }
        }

        // Suspended frames are reported so observers can show them as live.
        if let Some(notifier) = family.notifier() {
            let live: Vec<NodeRef> = self
                .thread_mut(&path)
                .map(|thread| {
                    thread
                        .stack
                        .iter()
                        .filter(|frame| !frame.finished && !frame.first)
                        .filter_map(|frame| frame.node)
                        .collect()
                })
                .unwrap_or_default();
            for node_ref in live {
                if let Some(node) = host.resolve_node(&node_ref) {
                    notifier.on_node_execution(node, "", &[]);
                    if family.is_debugging() {
                        notifier.break_node(node, false);
                    }
                }
            }
        }

        if let Some(thread) = self.thread_mut(&path) {
            let spent = thread
                .stack
                .get(stack_index)
                .is_some_and(|frame| frame.node.is_none() && frame.sub_threads.is_empty());
            if spent {
                thread.stack.remove(stack_index);
            }
        }

        continued
    }

    fn dispatch(&mut self, host: &mut Director, request: ThreadRequest, immediate: bool) {
        match request.kind {
            RequestKind::Thread => {
                self.begin_thread(host, request.node, request.input, immediate);
            }
            RequestKind::Stack => self.push_stack(host, request.node, request.input),
        }
    }
}

impl Director {
    /// Send the start notification to every node of this script, its
    /// imports and its children, then run what they requested.
    pub fn start(&mut self) {
        let scripts = self.unstarted_scripts();
        if scripts.is_empty() {
            return;
        }

        let family = self.family.clone();
        let was_queueing = family.is_queueing();
        family.set_queueing(true);

        for script in &scripts {
            let nodes = self
                .find_script(*script)
                .map(|director| director.all_nodes(false))
                .unwrap_or_default();
            for node in nodes {
                self.start_node(node);
            }
        }
        for script in scripts {
            if let Some(director) = self.find_script_mut(script) {
                director.started = true;
            }
        }

        if was_queueing {
            return;
        }
        family.set_queueing(false);
        for request in family.take_queue() {
            self.begin_thread_with(request, false, false);
        }
    }

    fn unstarted_scripts(&self) -> Vec<crate::id::DirectorId> {
        let mut scripts: Vec<_> = self
            .imports
            .iter()
            .flat_map(Director::unstarted_scripts)
            .collect();
        if !self.started {
            scripts.push(self.id());
        }
        scripts.extend(self.children.iter().flat_map(Director::unstarted_scripts));
        scripts
    }

    fn start_node(&mut self, node_ref: NodeRef) {
        let Some(mut behavior) = self
            .find_script_mut(node_ref.script)
            .and_then(|script| script.nodes.get_mut(&node_ref.node))
            .and_then(|node| node.behavior.take())
        else {
            return;
        };

        let mut data: Option<Box<dyn Any>> = None;
        {
            let mut ctx = NodeContext::new(self, node_ref, 0.0, 0.0, 0, true, &mut data);
            behavior.on_start(&mut ctx);
        }

        if let Some(node) = self
            .find_script_mut(node_ref.script)
            .and_then(|script| script.nodes.get_mut(&node_ref.node))
        {
            node.behavior = Some(behavior);
        }
    }

    /// Advance the family by one tick.
    ///
    /// Starts the family on its first tick, runs requests made on nested
    /// scripts since the last tick, then advances every thread once.
    /// Only the family root updates; calls on nested scripts are ignored.
    pub fn update(&mut self, sim_delta: f32, delta: f32) {
        if !self.is_root() {
            tracing::debug!("Ignoring update of nested script '{}'", self.name());
            return;
        }
        if self.executing {
            tracing::warn!("Ignoring re-entrant update of '{}'", self.name());
            return;
        }

        self.start();
        for request in self.family.take_deferred() {
            self.begin_thread_with(request, false, false);
        }

        let family = self.family.clone();
        if let Some(notifier) = family.notifier() {
            notifier.update(family.is_debugging(), family.should_step());
        }

        let mut scheduler = std::mem::take(&mut self.scheduler);
        self.executing = true;
        scheduler.update(self, sim_delta, delta);
        self.executing = false;
        self.scheduler = scheduler;

        if family.should_step() {
            if let Some(notifier) = family.notifier() {
                notifier.on_step_debugging();
            }
        }
        family.set_should_step(false);
    }

    /// Start a new thread on `node` through `input`.
    ///
    /// While a node is running the request is queued. On a nested script it
    /// is held for the family root. Otherwise the thread is created now and,
    /// once the family has started, runs immediately.
    pub fn begin_thread(&mut self, node: NodeRef, input: usize) -> Option<ThreadId> {
        self.begin_thread_with(ThreadRequest::thread(node, input), false, true)
    }

    /// Push a frame for `node` onto the running thread. The running frame
    /// waits beneath it until it returns.
    pub fn push_stack(&mut self, node: NodeRef, input: usize) {
        self.begin_thread_with(ThreadRequest::stack(node, input), false, true);
    }

    pub(crate) fn begin_thread_with(&mut self, request: ThreadRequest, reverse: bool, immediate: bool) -> Option<ThreadId> {
        if self.family.is_queueing() {
            self.family.enqueue(request, reverse);
            return None;
        }
        if !self.is_root() || self.executing {
            self.family.defer(request);
            return None;
        }
        if self.resolve_node(&request.node).is_none() {
            tracing::warn!("Cannot run unknown node {}", request.node.node);
            return None;
        }
        self.run_request(request, immediate)
    }

    fn run_request(&mut self, request: ThreadRequest, immediate: bool) -> Option<ThreadId> {
        let mut scheduler = std::mem::take(&mut self.scheduler);
        self.executing = true;
        let id = match request.kind {
            RequestKind::Thread => Some(scheduler.begin_thread(self, request.node, request.input, immediate)),
            RequestKind::Stack => {
                scheduler.push_stack(self, request.node, request.input);
                None
            }
        };
        self.executing = false;
        self.scheduler = scheduler;
        id
    }

    /// Run one visit of a node. `None` when the node no longer exists.
    pub(crate) fn execute_node(
        &mut self,
        node_ref: NodeRef,
        sim_delta: f32,
        delta: f32,
        input: usize,
        first: bool,
        data: &mut Option<Box<dyn Any>>,
    ) -> Option<NodeOutcome> {
        let node = self
            .find_script_mut(node_ref.script)
            .and_then(|script| script.nodes.get_mut(&node_ref.node))?;
        let kind = node.kind();
        let Some(mut behavior) = node.behavior.take() else {
            tracing::debug!("Node {} has no behavior to run", node.display_name());
            return Some(NodeOutcome {
                not_finished: false,
                latent: kind.is_latent(),
            });
        };

        let not_finished = {
            let mut ctx = NodeContext::new(self, node_ref, sim_delta, delta, input, first, data);
            behavior.update(&mut ctx)
        };

        if !kind.is_event() {
            if first && not_finished {
                behavior.register_messages();
            } else if !first && !not_finished {
                behavior.unregister_messages();
            }
        }

        if let Some(node) = self
            .find_script_mut(node_ref.script)
            .and_then(|script| script.nodes.get_mut(&node_ref.node))
        {
            node.behavior = Some(behavior);
        }

        Some(NodeOutcome {
            not_finished,
            latent: kind.is_latent(),
        })
    }

    /// Follow every activated output of a node and queue a thread for each
    /// enabled target. Returns the names of the outputs that fired.
    pub(crate) fn fire_outputs(&mut self, node_ref: NodeRef) -> Vec<String> {
        let max_depth = self.config.max_redirect_depth;
        let family = self.family.clone();
        let Some(script) = self.find_script_mut(node_ref.script) else {
            return Vec::new();
        };
        let Some(node) = script.nodes.get_mut(&node_ref.node) else {
            return Vec::new();
        };

        let fired: Vec<usize> = node
            .outputs_mut()
            .iter_mut()
            .enumerate()
            .filter_map(|(index, output)| output.test().then_some(index))
            .collect();

        let script: &Director = script;
        let mut names = Vec::with_capacity(fired.len());
        for index in fired {
            let Some((output_name, targets)) = resolve_output(script, node_ref, index, max_depth) else {
                continue;
            };
            names.push(output_name);

            for target in targets {
                let Some(target) = resolve_input(script, target, max_depth) else {
                    continue;
                };
                if !script.is_node_enabled(&target.node) {
                    continue;
                }
                let request = ThreadRequest::thread(NodeRef::new(script.id(), target.node), target.input);
                family.enqueue(request, true);
            }
        }
        names
    }

    /// Log, notify and check breakpoints after a node ran
    pub(crate) fn process_updated_node(
        &self,
        node_ref: NodeRef,
        first: bool,
        continued: bool,
        input: usize,
        outputs: &[String],
    ) {
        let Some(script) = self.find_script(node_ref.script) else {
            return;
        };
        let Some(node) = script.nodes.get(&node_ref.node) else {
            return;
        };
        let input_name = node.input_name(input).unwrap_or_default();

        if script.node_logging && node.logging() {
            tracing::info!(
                "{}",
                execution_message(
                    first,
                    continued,
                    input_name,
                    &node.node_type().full_name(),
                    node.name(),
                    node.comment(),
                    outputs
                )
            );
        }

        if let Some(notifier) = self.family.notifier() {
            notifier.on_node_execution(node, input_name, outputs);
            if self.family.is_debugging() {
                notifier.break_node(node, false);
            } else if notifier.should_break(node) {
                self.toggle_debug_enabled(true);
                notifier.break_node(node, true);
            }
        }
    }
}

/// Follow an output's redirect chain. Returns the name and links of the
/// output that finally carries the activation.
fn resolve_output(
    script: &Director,
    node_ref: NodeRef,
    index: usize,
    max_depth: usize,
) -> Option<(String, Vec<crate::link::InputRef>)> {
    let mut node = script.nodes.get(&node_ref.node)?;
    let mut output = node.outputs().get(index)?;
    let mut depth = 0;

    while let Some(redirect) = output.redirect {
        depth += 1;
        if depth > max_depth {
            tracing::warn!("Output redirect chain from {} is too deep", node.display_name());
            return None;
        }
        node = script.nodes.get(&redirect.node)?;
        output = node.outputs().get(redirect.output)?;
    }
    Some((output.name.clone(), output.links.clone()))
}

/// Follow an input's redirect chain to the input that receives the
/// activation
fn resolve_input(
    script: &Director,
    mut target: crate::link::InputRef,
    max_depth: usize,
) -> Option<crate::link::InputRef> {
    for _ in 0..=max_depth {
        let node = script.nodes.get(&target.node)?;
        let input = node.inputs().get(target.input)?;
        match input.redirect {
            Some(redirect) => target = redirect,
            None => return Some(target),
        }
    }
    tracing::warn!("Input redirect chain into {} is too deep", target.node);
    None
}

/// One line describing a node visit for the execution log
pub(crate) fn execution_message(
    first: bool,
    continued: bool,
    input: &str,
    type_name: &str,
    name: &str,
    comment: &str,
    outputs: &[String],
) -> String {
    let verb = match (first, continued) {
        (true, true) => "Executed",
        (true, false) => "Began",
        (false, true) => "Finished",
        (false, false) => "Updated",
    };

    let mut message = format!("{verb} Input ({input}) on Node '{type_name}");
    if !name.is_empty() {
        message.push('.');
        message.push_str(name);
    }
    if !comment.is_empty() {
        message.push_str(" - ");
        message.push_str(comment);
    }
    message.push('\'');
    if !outputs.is_empty() {
        message.push_str(" and Output (");
        message.push_str(&outputs.join(", "));
        message.push(')');
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectorConfig;
    use crate::id::Id;
    use crate::test_support::{director_with, test_director, RecordingNotifier, TEST_LIBRARY};
    use crate::node::NodeBehavior;
    use crate::value::Value;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn begin(director: &mut Director, node: &Id) -> Option<ThreadId> {
        let node = director.locate_node(node).unwrap();
        director.begin_thread(node, 0)
    }

    #[test]
    fn test_execution_message() {
        let outputs = vec!["True".to_string(), "Out".to_string()];
        assert_eq!(
            execution_message(true, true, "In", "Core.If", "Check", "", &outputs),
            "Executed Input (In) on Node 'Core.If.Check' and Output (True, Out)"
        );
        assert_eq!(
            execution_message(true, false, "In", "Core.Delay", "", "wait a bit", &[]),
            "Began Input (In) on Node 'Core.Delay - wait a bit'"
        );
        assert_eq!(
            execution_message(false, true, "In", "Core.Delay", "", "", &[]),
            "Finished Input (In) on Node 'Core.Delay'"
        );
        assert_eq!(
            execution_message(false, false, "In", "Core.Wait Ticks", "", "", &[]),
            "Updated Input (In) on Node 'Core.Wait Ticks'"
        );
    }

    #[test]
    fn test_thread_ids_wrap() {
        let mut scheduler = Scheduler::default();
        scheduler.next_thread_id = u32::MAX;
        assert_eq!(scheduler.allocate_id(), ThreadId(u32::MAX));
        assert_eq!(scheduler.allocate_id(), ThreadId(0));
    }

    #[test]
    fn test_off_tick_chain_runs_to_completion() {
        let mut director = test_director();
        let root = director.root_graph();
        let first = director.create_node("Pass", &root).unwrap();
        let second = director.create_node("Pass", &root).unwrap();
        let log = director.create_node("Log", &root).unwrap();
        director.connect(&first, "Out", &second, "In").unwrap();
        director.connect(&second, "Out", &log, "In").unwrap();
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        assert!(begin(&mut director, &first).is_some());

        assert_eq!(notifier.executed(), vec!["Test.Pass", "Test.Pass", "Core.Log"]);
        assert!(!director.is_running(None));
    }

    #[test]
    fn test_begin_before_start_waits_for_update() {
        let mut director = test_director();
        let root = director.root_graph();
        let pass = director.create_node("Pass", &root).unwrap();
        let notifier = RecordingNotifier::attach(&director);

        let thread = begin(&mut director, &pass).unwrap();
        assert!(director.is_running(Some(thread)));
        assert!(notifier.executed().is_empty());

        director.update(0.0, 0.0);
        assert_eq!(notifier.executed(), vec!["Test.Pass"]);
        assert!(!director.is_running(None));
    }

    #[test]
    fn test_outputs_run_in_activation_order() {
        let mut director = test_director();
        let root = director.root_graph();
        let fork = director.create_node("Fork", &root).unwrap();
        let log = director.create_node("Log", &root).unwrap();
        let increment = director.create_node("Increment", &root).unwrap();
        director.connect(&fork, "A", &log, "In").unwrap();
        director.connect(&fork, "B", &increment, "In").unwrap();
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        begin(&mut director, &fork);

        assert_eq!(notifier.executed(), vec!["Test.Fork", "Core.Log", "Core.Increment"]);
        assert!(!director.is_running(None));
    }

    #[test]
    fn test_outputs_fired_during_tick_run_in_activation_order() {
        let mut director = test_director();
        let root = director.root_graph();
        let split = director.create_node("Split", &root).unwrap();
        let log = director.create_node("Log", &root).unwrap();
        let increment = director.create_node("Increment", &root).unwrap();
        director.connect(&split, "A", &log, "In").unwrap();
        director.connect(&split, "B", &increment, "In").unwrap();
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        begin(&mut director, &split);
        assert_eq!(notifier.executed(), vec!["Test.Split"]);

        director.update(0.1, 0.1);

        assert_eq!(
            notifier.executed(),
            vec!["Test.Split", "Test.Split", "Core.Log", "Core.Increment"]
        );
        assert!(!director.is_running(None));
    }

    #[test]
    fn test_latent_node_revisited_once_per_tick() {
        let mut director = test_director();
        let root = director.root_graph();
        let hold = director.create_node("Hold", &root).unwrap();
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        let thread = begin(&mut director, &hold).unwrap();
        assert_eq!(notifier.visits("Test.Hold"), 1);

        for tick in 1..=3 {
            director.update(0.1, 0.1);
            assert_eq!(notifier.visits("Test.Hold"), 1 + tick);
        }
        assert!(director.is_running(Some(thread)));
        let frame = &director.threads()[0].stack()[0];
        assert!(!frame.is_first());
        assert!(!frame.is_finished());
        assert!(notifier.keep_alive_count() >= 3);
    }

    #[test]
    fn test_latent_chain_across_ticks() {
        let mut director = test_director();
        let root = director.root_graph();
        let event = director.create_node("Remote Event", &root).unwrap();
        let pass = director.create_node("Pass", &root).unwrap();
        let wait = director.create_node("Wait Ticks", &root).unwrap();
        director.connect(&event, "Out", &pass, "In").unwrap();
        director.connect(&pass, "Out", &wait, "In").unwrap();
        director.node_mut(&wait).unwrap().value_links_mut()[0].default = Value::Int(2);
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        begin(&mut director, &event);
        assert_eq!(
            notifier.executed(),
            vec!["Core.Remote Event", "Test.Pass", "Core.Wait Ticks"]
        );
        assert!(director.is_running(None));

        director.update(0.1, 0.1);
        assert!(director.is_running(None));

        director.update(0.1, 0.1);
        assert!(!director.is_running(None));
        assert_eq!(notifier.visits("Core.Wait Ticks"), 3);
    }

    #[test]
    fn test_safety_timer_bounds_cycles() {
        let config = DirectorConfig {
            safety_timer_secs: 0.01,
            ..DirectorConfig::default()
        };
        let mut director = director_with(config);
        director.add_library(TEST_LIBRARY, "1.0").unwrap();
        let root = director.root_graph();
        let pass = director.create_node("Pass", &root).unwrap();
        director.connect(&pass, "Out", &pass, "In").unwrap();
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        let thread = begin(&mut director, &pass).unwrap();

        assert!(director.is_running(Some(thread)));
        assert!(notifier.visits("Test.Pass") > 1);

        let before = notifier.visits("Test.Pass");
        director.update(0.1, 0.1);
        assert!(notifier.visits("Test.Pass") > before);
        assert!(director.is_running(None));
    }

    #[test]
    fn test_deleting_running_node() {
        let mut director = test_director();
        let root = director.root_graph();
        let hold = director.create_node("Hold", &root).unwrap();
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);
        begin(&mut director, &hold);

        assert!(director.delete_node(&hold));
        director.update(0.1, 0.1);

        assert_eq!(notifier.visits("Test.Hold"), 1);
        assert!(!director.is_running(None));
    }

    /// Records message registration of the node it replaces
    struct Listener(Rc<RefCell<Vec<&'static str>>>);

    impl NodeBehavior for Listener {
        fn update(&mut self, _ctx: &mut NodeContext<'_>) -> bool {
            true
        }

        fn register_messages(&mut self) {
            self.0.borrow_mut().push("register");
        }

        fn unregister_messages(&mut self) {
            self.0.borrow_mut().push("unregister");
        }
    }

    #[test]
    fn test_deleting_waiting_node_unregisters_messages() {
        let mut director = test_director();
        let root = director.root_graph();
        let hold = director.create_node("Hold", &root).unwrap();
        let idle = director.create_node("Hold", &root).unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        director.node_mut(&hold).unwrap().behavior = Some(Box::new(Listener(calls.clone())));
        director.node_mut(&idle).unwrap().behavior = Some(Box::new(Listener(calls.clone())));
        director.update(0.0, 0.0);
        begin(&mut director, &hold);
        assert_eq!(*calls.borrow(), vec!["register"]);

        assert!(director.delete_node(&hold));
        assert_eq!(*calls.borrow(), vec!["register", "unregister"]);

        assert!(director.delete_node(&idle));
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn test_unreleased_data_is_dropped() {
        let mut director = test_director();
        let root = director.root_graph();
        let leaky = director.create_node("Leaky", &root).unwrap();
        let log = director.create_node("Log", &root).unwrap();
        director.connect(&leaky, "Out", &log, "In").unwrap();
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        begin(&mut director, &leaky);

        assert_eq!(notifier.executed(), vec!["Test.Leaky", "Core.Log"]);
        assert!(!director.is_running(None));
    }

    #[test]
    fn test_disabled_target_is_skipped() {
        let mut director = test_director();
        let root = director.root_graph();
        let pass = director.create_node("Pass", &root).unwrap();
        let log = director.create_node("Log", &root).unwrap();
        director.connect(&pass, "Out", &log, "In").unwrap();
        director.set_node_enabled(&log, false);
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        begin(&mut director, &pass);

        assert_eq!(notifier.executed(), vec!["Test.Pass"]);
    }

    #[test]
    fn test_output_redirect_follows_target_links() {
        let mut director = test_director();
        let root = director.root_graph();
        let fork = director.create_node("Fork", &root).unwrap();
        let relay = director.create_node("Relay", &root).unwrap();
        let log = director.create_node("Log", &root).unwrap();
        let increment = director.create_node("Increment", &root).unwrap();
        director.connect(&relay, "Out", &log, "In").unwrap();
        director.connect(&fork, "B", &increment, "In").unwrap();
        director.set_output_redirect(&fork, "A", Some((&relay, "Out"))).unwrap();
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        begin(&mut director, &fork);

        assert_eq!(notifier.executed(), vec!["Test.Fork", "Core.Log", "Core.Increment"]);
    }

    #[test]
    fn test_input_redirect_lands_on_target() {
        let mut director = test_director();
        let root = director.root_graph();
        let pass = director.create_node("Pass", &root).unwrap();
        let relay = director.create_node("Relay", &root).unwrap();
        let log = director.create_node("Log", &root).unwrap();
        director.connect(&pass, "Out", &relay, "In").unwrap();
        director.set_input_redirect(&relay, "In", Some((&log, "In"))).unwrap();
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        begin(&mut director, &pass);

        assert_eq!(notifier.executed(), vec!["Test.Pass", "Core.Log"]);
    }

    #[test]
    fn test_breakpoint_pauses_until_stepped() {
        let mut director = test_director();
        let root = director.root_graph();
        let first = director.create_node("Pass", &root).unwrap();
        let log = director.create_node("Log", &root).unwrap();
        let last = director.create_node("Pass", &root).unwrap();
        director.connect(&first, "Out", &log, "In").unwrap();
        director.connect(&log, "Out", &last, "In").unwrap();
        let notifier = RecordingNotifier::attach(&director);
        notifier.add_breakpoint("Core.Log");
        director.update(0.0, 0.0);

        begin(&mut director, &first);
        assert!(director.is_debugging());
        assert_eq!(notifier.executed(), vec!["Test.Pass", "Core.Log"]);
        assert_eq!(notifier.breaks(), vec![("Core.Log".to_string(), true)]);
        assert_eq!(notifier.debug_events(), vec!["begin"]);

        director.update(0.1, 0.1);
        assert_eq!(notifier.executed().len(), 2);
        assert!(director.is_running(None));

        director.step_debugger();
        director.update(0.1, 0.1);
        assert_eq!(notifier.executed(), vec!["Test.Pass", "Core.Log", "Test.Pass"]);
        assert!(notifier.breaks().contains(&("Test.Pass".to_string(), false)));
        assert_eq!(notifier.debug_events(), vec!["begin", "step"]);
        assert!(!director.is_running(None));

        director.toggle_debug_enabled(false);
        assert_eq!(notifier.debug_events(), vec!["begin", "step", "end"]);
    }

    #[test]
    fn test_child_requests_run_on_next_update() {
        let mut director = test_director();
        let mut child = director.spawn_script();
        child.init(None, None).unwrap();
        let child_root = child.root_graph();
        let log = child.create_node("Log", &child_root).unwrap();
        let child_id = director.add_child(child).unwrap();
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        let node = director.locate_node(&log).unwrap();
        let child = director.child_mut(child_id).unwrap();
        assert_eq!(child.begin_thread(node, 0), None);
        assert!(notifier.executed().is_empty());

        director.update(0.1, 0.1);
        assert_eq!(notifier.executed(), vec!["Core.Log"]);
        assert!(!director.is_running(None));
    }

    #[test]
    fn test_nested_update_is_ignored() {
        let mut director = test_director();
        let mut child = director.spawn_script();
        child.init(None, None).unwrap();
        let child_id = director.add_child(child).unwrap();

        director.child_mut(child_id).unwrap().update(0.1, 0.1);

        assert!(!director.has_started());
        assert!(!director.child(child_id).unwrap().has_started());
    }

    #[test]
    fn test_trigger_event() {
        let mut director = test_director();
        let root = director.root_graph();
        let event = director.create_node("Remote Event", &root).unwrap();
        let log = director.create_node("Log", &root).unwrap();
        director.connect(&event, "Out", &log, "In").unwrap();
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        assert!(director.trigger_event(&event, "Out").is_some());
        assert_eq!(notifier.executed(), vec!["Core.Remote Event", "Core.Log"]);

        assert!(director.trigger_event(&log, "Out").is_none());
        assert!(director.trigger_event(&event, "Missing").is_none());
    }

    #[test]
    fn test_global_change_reaches_each_member_once() {
        let mut director = test_director();
        let root = director.root_graph();
        let first = director.create_node("Int", &root).unwrap();
        let second = director.create_node("Int", &root).unwrap();
        for node in [&first, &second] {
            director.set_node_name(node, "Score");
            director.set_global(node, true);
        }
        let notifier = RecordingNotifier::attach(&director);

        assert!(director.set_value(&first, 5));

        assert_eq!(director.value(&second), Some(Value::Int(5)));
        let changes = notifier.value_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0], (first, Value::Int(5)));
        assert_eq!(changes[1].0, second);
    }
}
