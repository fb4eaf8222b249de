//! End-to-end inheritance behavior on the native provider.
//!
//! Every case runs once per kind of child context (thread, fiber, task on
//! the calling thread, task on a runtime worker).
//! Each test uses its own owner so tests in this binary cannot observe
//! each other's values.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lineage_core::native::{self, fiber, task, thread};
use lineage_core::{Attribute, ExecutionContextProvider, Policy};
use lineage_test_utils::contexts::ContextSpawner;
use lineage_test_utils::fixtures::unique_owner;
use lineage_test_utils::tracing_setup::init_test_tracing;
use pretty_assertions::assert_eq;

fn setting(policy: Policy) -> Arc<Attribute<&'static str>> {
    Arc::new(Attribute::native(&unique_owner("Target"), "setting", policy))
}

fn with_default() -> Policy {
    Policy::new().with_default(|| "default_setting")
}

#[test]
fn test_returns_default_when_nothing_set() {
    init_test_tracing();
    let attr = setting(with_default());

    let on_thread = {
        let attr = Arc::clone(&attr);
        thread::spawn(move || {
            attr.set("other_setting");
            attr.get()
        })
        .join()
        .unwrap()
    };

    assert_eq!(attr.get(), Some("default_setting"));
    assert_eq!(on_thread, Some("other_setting"));
}

#[test]
fn test_isolates_writes_to_the_thread() {
    let attr = setting(Policy::new());
    attr.set("original_setting");

    let on_thread = {
        let attr = Arc::clone(&attr);
        thread::spawn(move || {
            attr.set("other_setting");
            attr.get()
        })
        .join()
        .unwrap()
    };

    assert_eq!(attr.get(), Some("original_setting"));
    assert_eq!(on_thread, Some("other_setting"));
}

#[test]
fn test_inheritance_between_contexts() {
    for spawner in ContextSpawner::ALL {
        let attr = setting(Policy::new().inherit(true));
        attr.set("original_setting");

        let child = Arc::clone(&attr);
        assert_eq!(spawner.run(move || child.get()), Some("original_setting"), "{spawner}");
    }
}

#[test]
fn test_child_overrides_do_not_reach_parent() {
    for spawner in ContextSpawner::ALL {
        let attr = setting(Policy::new().inherit(true));
        attr.set("original_setting");

        let child = Arc::clone(&attr);
        let (initial, overridden) = spawner.run(move || {
            let initial = child.get();
            child.set("new_setting");
            (initial, child.get())
        });

        assert_eq!(attr.get(), Some("original_setting"), "{spawner}");
        assert_eq!(initial, Some("original_setting"), "{spawner}");
        assert_eq!(overridden, Some("new_setting"), "{spawner}");
    }
}

#[test]
fn test_default_on_child_when_parent_never_set() {
    for spawner in ContextSpawner::ALL {
        let attr = setting(with_default().inherit(true));
        let child = Arc::clone(&attr);
        assert_eq!(spawner.run(move || child.get()), Some("default_setting"), "{spawner}");
    }
}

#[test]
fn test_parent_value_preferred_over_default() {
    for spawner in ContextSpawner::ALL {
        let attr = setting(with_default().inherit(true));
        attr.set("original_setting");
        let child = Arc::clone(&attr);
        assert_eq!(spawner.run(move || child.get()), Some("original_setting"), "{spawner}");
    }
}

#[test]
fn test_default_persists_on_parent_when_child_writes() {
    for spawner in ContextSpawner::ALL {
        let attr = setting(with_default().inherit(true));
        let child = Arc::clone(&attr);
        spawner.run(move || {
            child.set("new_setting");
        });
        assert_eq!(attr.get(), Some("default_setting"), "{spawner}");
    }
}

#[test]
fn test_default_computed_once_per_context() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let attr: Attribute<usize> = Attribute::native(
        &unique_owner("Counter"),
        "value",
        Policy::new().with_default(move || counter.fetch_add(1, Ordering::SeqCst)),
    );

    assert_eq!(attr.get(), Some(0));
    assert_eq!(attr.get(), Some(0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_default_shared_down_the_chain_once_materialized() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let attr = Arc::new(Attribute::<usize>::native(
        &unique_owner("Counter"),
        "value",
        Policy::new()
            .inherit(true)
            .with_default(move || counter.fetch_add(1, Ordering::SeqCst) + 100),
    ));

    assert_eq!(attr.get(), Some(100));
    for spawner in ContextSpawner::ALL {
        let child = Arc::clone(&attr);
        let grandchild = spawner.run(move || {
            let attr = Arc::clone(&child);
            fiber::run(move || attr.get())
        });
        assert_eq!(grandchild, Some(100), "{spawner}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_siblings_do_not_see_each_other() {
    let attr = setting(Policy::new().inherit(true));
    let (tx, rx) = std::sync::mpsc::channel();

    let writer = {
        let attr = Arc::clone(&attr);
        thread::spawn(move || {
            attr.set("from_writer");
            tx.send(()).unwrap();
        })
    };
    rx.recv().unwrap();
    let reader = {
        let attr = Arc::clone(&attr);
        thread::spawn(move || attr.get())
    };

    writer.join().unwrap();
    assert_eq!(reader.join().unwrap(), None);
    assert_eq!(attr.get(), None);
}

/// Root sets a value, a heavyweight child inherits it, overrides it, and the
/// root keeps its own value.
#[test]
fn test_thread_child_override_scenario() {
    let attr = setting(Policy::new().inherit(true));
    attr.set("original");

    let child = Arc::clone(&attr);
    let (inherited, overridden) = thread::spawn(move || {
        let inherited = child.get();
        child.set("new");
        (inherited, child.get())
    })
    .join()
    .unwrap();

    assert_eq!(inherited, Some("original"));
    assert_eq!(overridden, Some("new"));
    assert_eq!(attr.get(), Some("original"));
}

/// A value written by a thread outside any fiber is visible to threads it
/// spawns later, even two levels down.
#[test]
fn test_heavyweight_write_visible_to_later_descendants() {
    let attr = setting(Policy::new().inherit(true));

    let writer = Arc::clone(&attr);
    let seen = thread::spawn(move || {
        writer.set("v");
        let reader = Arc::clone(&writer);
        thread::spawn(move || thread::spawn(move || reader.get()).join().unwrap())
            .join()
            .unwrap()
    })
    .join()
    .unwrap();

    assert_eq!(seen, Some("v"));
}

#[test]
fn test_value_written_after_child_creation_is_seen_live() {
    let attr = setting(Policy::new().inherit(true));
    let pending = fiber::Fiber::new({
        let attr = Arc::clone(&attr);
        move || attr.get()
    });
    attr.set("late");
    assert_eq!(pending.resume(), Some("late"));
}

#[test]
fn test_reads_do_not_copy_inherited_values() {
    let attr = setting(Policy::new().inherit(true));
    attr.set("parent");
    let key = attr.key().clone();

    let child = Arc::clone(&attr);
    let stored_locally = fiber::run(move || {
        assert_eq!(child.get(), Some("parent"));
        native::current().has(&key)
    });
    assert!(!stored_locally);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_task_on_worker_inherits_from_spawner() {
    let attr = setting(Policy::new().inherit(true));
    attr.set("from_spawner");
    let spawner = native::current().id();

    let child = Arc::clone(&attr);
    let (seen, polled_on) = task::spawn(async move {
        tokio::task::yield_now().await;
        let seen = child.get();
        (seen, native::NativeProvider::shared().current_heavyweight().id())
    })
    .await
    .unwrap();

    assert_eq!(seen, Some("from_spawner"));
    assert_ne!(polled_on, spawner);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_nested_worker_tasks_inherit_from_spawner() {
    let attr = setting(with_default().inherit(true));
    attr.set("from_spawner");

    let child = Arc::clone(&attr);
    let (inner, outer) = task::spawn(async move {
        let grandchild = Arc::clone(&child);
        let inner = task::spawn(async move { grandchild.get() }).await.unwrap();
        child.set("from_outer_task");
        (inner, child.get())
    })
    .await
    .unwrap();

    assert_eq!(inner, Some("from_spawner"));
    assert_eq!(outer, Some("from_outer_task"));
    assert_eq!(attr.get(), Some("from_spawner"));
}
