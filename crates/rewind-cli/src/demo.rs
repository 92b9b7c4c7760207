//! The built-in demo: `demo.QuickSort` traced on two lanes at once.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use rewind_config::RewindConfig;
use rewind_instrument::Instrumentor;
use rewind_model::{CallTree, CallTreeView, EventLog, NodeId};
use rewind_trace::{EventKind, ObjRef, ThreadRef, TraceSession, Value};
use rewind_vm::{samples, Vm};
use serde::Serialize;

pub const DEFAULT_VALUES: [i32; 9] = [5, 2, 3, 8, 7, 3, 8, 6, 3];

/// `main` sorts the input as given, `worker` sorts it reversed.
const LANES: [(&str, bool); 2] = [("main", false), ("worker", true)];

#[derive(Args)]
pub struct DemoArgs {
    /// Comma-separated integers to sort
    #[arg(
        long,
        value_delimiter = ',',
        allow_hyphen_values = true,
        default_values_t = crate::demo::DEFAULT_VALUES
    )]
    pub values: Vec<i32>,

    /// Lane to report on (defaults to the first by name)
    #[arg(long)]
    pub thread: Option<String>,

    /// Include the lane's event log
    #[arg(long)]
    pub log: bool,

    /// Keep calls into uninstrumented library code in the printed tree
    #[arg(long)]
    pub all_calls: bool,

    /// Emit JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub thread: String,
    pub threads: Vec<String>,
    pub sorted: Vec<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<Vec<String>>,
    pub call_tree: CallTreeView,
    /// Locals of the top-level call right before it returned.
    pub locals: BTreeMap<String, String>,
    #[serde(skip)]
    tree_lines: Vec<String>,
}

impl DemoReport {
    pub fn print_human(&self) {
        println!("lanes: {}", self.threads.join(", "));
        println!("sorted on {}: {:?}", self.thread, self.sorted);
        if let Some(log) = &self.log {
            println!();
            println!("event log:");
            for line in log {
                println!("  {line}");
            }
        }
        println!();
        println!("call tree:");
        for line in &self.tree_lines {
            println!("  {line}");
        }
        println!();
        println!("locals before returning:");
        for (name, value) in &self.locals {
            println!("  {name} = {value}");
        }
    }
}

pub fn run(config: &RewindConfig, args: &DemoArgs) -> Result<DemoReport> {
    if args.log && !config.trace.write_log {
        bail!("--log needs trace.write_log = true");
    }

    let session = Arc::new(TraceSession::new(config.trace.clone()));
    let vm = Vm::with_config(Arc::clone(&session), config.vm.clone());
    vm.load_class(samples::quick_sort_class()?)?;

    let instrumentor = Instrumentor::new(config.instrument.clone());
    let class = vm
        .class(samples::QUICK_SORT)
        .context("sample class vanished after loading")?;
    let result = instrumentor.instrument_and_redefine(&class, &vm)?;
    if let Some((method, err)) = result.failures.first() {
        bail!("could not instrument {method}: {err}");
    }

    let mut sorted = BTreeMap::new();
    for (name, output) in run_lanes(&vm, &args.values) {
        sorted.insert(name, output?);
    }
    tracing::info!(target: "rewind.cli", events = session.len(), "demo finished");

    let log = EventLog::from_session(&session);
    let thread = select_thread(&log, args.thread.as_deref())?;
    let tree = log.call_stack(&thread);
    let lines = args.log.then(|| lane_log(&log, &session.log_lines(), &thread));

    Ok(DemoReport {
        thread: thread.name().to_owned(),
        threads: log
            .threads()
            .iter()
            .map(|thread| thread.name().to_owned())
            .collect(),
        sorted: sorted.remove(thread.name()).unwrap_or_default(),
        log: lines,
        call_tree: log.call_tree_view(&thread),
        locals: final_locals(&log, &tree),
        tree_lines: tree_lines(&tree, args.all_calls),
    })
}

/// Run the sort on every demo lane concurrently.
fn run_lanes(vm: &Vm, values: &[i32]) -> Vec<(String, Result<Vec<i32>>)> {
    let workers: Vec<_> = LANES
        .into_iter()
        .map(|(name, reversed)| {
            let vm = vm.clone();
            let mut input = values.to_vec();
            if reversed {
                input.reverse();
            }
            let worker = thread::spawn(move || sort_on_lane(&vm, name, input));
            (name, worker)
        })
        .collect();

    workers
        .into_iter()
        .map(|(name, worker)| {
            let output = worker
                .join()
                .map_err(|_| anyhow!("lane {name} panicked"))
                .and_then(|output| output);
            (name.to_owned(), output)
        })
        .collect()
}

fn sort_on_lane(vm: &Vm, name: &str, input: Vec<i32>) -> Result<Vec<i32>> {
    let list = ObjRef::list(
        "java/util/ArrayList",
        input.into_iter().map(Value::Int).collect(),
    );
    let sorted = vm
        .lane(name)
        .invoke_static(
            samples::QUICK_SORT,
            "sort",
            samples::SORT_DESCRIPTOR,
            vec![Value::Object(list)],
        )
        .with_context(|| format!("sort failed on lane {name}"))?;

    let elements = sorted
        .as_ref()
        .and_then(Value::as_object)
        .and_then(ObjRef::list_elements)
        .context("sort did not return a list")?;
    elements
        .iter()
        .map(|value| value.as_int().context("sorted list holds a non-integer"))
        .collect()
}

fn select_thread(log: &EventLog, name: Option<&str>) -> Result<ThreadRef> {
    let threads = log.threads();
    match name {
        Some(name) => log.thread_named(name).with_context(|| {
            let known: Vec<&str> = threads.iter().map(ThreadRef::name).collect();
            format!("no lane named {name}; recorded lanes: {}", known.join(", "))
        }),
        None => threads.into_iter().next().context("nothing was recorded"),
    }
}

fn lane_log(log: &EventLog, lines: &[String], thread: &ThreadRef) -> Vec<String> {
    log.events()
        .iter()
        .zip(lines)
        .filter(|(event, _)| &event.thread == thread)
        .map(|(event, line)| format!("{:>5} {line}", event.sequence))
        .collect()
}

fn final_locals(log: &EventLog, tree: &CallTree) -> BTreeMap<String, String> {
    let Some(root) = tree.roots().first() else {
        return BTreeMap::new();
    };
    let activation = tree[*root].activation();
    let returning = log.events().iter().rev().find(|event| {
        &event.thread == tree.thread()
            && event.activation == activation
            && matches!(event.kind, EventKind::ReturnValue { .. })
    });
    let Some(returning) = returning else {
        return BTreeMap::new();
    };

    log.local_variables_at(tree.thread(), returning.sequence)
        .into_iter()
        .map(|(name, value)| {
            let rendered = log.render_at(&value, returning.sequence);
            (name, rendered)
        })
        .collect()
}

fn tree_lines(tree: &CallTree, all_calls: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for root in tree.roots() {
        push_lines(tree, *root, 0, all_calls, &mut lines);
    }
    lines
}

fn push_lines(
    tree: &CallTree,
    id: NodeId,
    depth: usize,
    all_calls: bool,
    out: &mut Vec<String>,
) {
    let node = &tree[id];
    if !all_calls && !node.is_instrumented() && !node.is_gap() {
        return;
    }
    out.push(format!("{:indent$}{}", "", tree.display(id), indent = depth * 2));
    for child in node.children() {
        push_lines(tree, *child, depth + 1, all_calls, out);
    }
}
