//! Integration Tests for Reactive System
//!
//! These tests verify that signals, memos, watches and the list reconciler
//! work together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use weft_core::list::Node;
use weft_core::reactive::{Expr, Runtime, Signal};
use weft_core::{ReactiveError, RuntimeConfig};

fn log<T>() -> Rc<RefCell<Vec<T>>> {
    Rc::new(RefCell::new(Vec::new()))
}

/// A diamond `a -> b, a -> c, (b, c) -> d` fires `d` once per write, with
/// both branches already updated.
#[test]
fn diamond_fires_once_with_fresh_inputs() {
    let rt = Runtime::new();
    let a = rt.signal(1);

    let source = a.clone();
    let b = rt.memo(move || source.get() + 1).unwrap();
    let source = a.clone();
    let c = rt.memo(move || source.get() * 10).unwrap();

    let seen = log();
    {
        let (b, c, seen) = (b.clone(), c.clone(), seen.clone());
        rt.watch(move || (b.get(), c.get()), move |pair| seen.borrow_mut().push(pair))
            .unwrap();
    }

    a.set(2);
    a.set(3);

    assert_eq!(*seen.borrow(), vec![(2, 10), (3, 20), (4, 30)]);
}

/// Writes inside a batch reach dependants once, with the final value.
#[test]
fn batch_coalesces_writes() {
    let rt = Runtime::new();
    let a = rt.signal(0);
    let seen = log();

    {
        let (a, seen) = (a.clone(), seen.clone());
        rt.watch(move || a.get(), move |v| seen.borrow_mut().push(v))
            .unwrap();
    }

    rt.batch(|| {
        a.set(1);
        a.set(2);
    });

    assert_eq!(*seen.borrow(), vec![0, 2]);
}

/// A memo registered before a watch over the same signal is already fresh
/// when the watch reacts.
#[test]
fn memo_updates_before_watch() {
    let rt = Runtime::new();
    let count = rt.signal(1);

    let source = count.clone();
    let doubled = rt.memo(move || source.get() * 2).unwrap();

    let seen = log();
    {
        let (count, doubled, seen) = (count.clone(), doubled.clone(), seen.clone());
        rt.watch(
            move || count.get(),
            move |v| seen.borrow_mut().push((v, doubled.get_untracked())),
        )
        .unwrap();
    }

    count.set(4);
    assert_eq!(seen.borrow().last(), Some(&(4, 8)));
}

/// Teardowns run in reverse registration order.
#[test]
fn teardown_runs_in_reverse() {
    let rt = Runtime::new();
    let order = log();

    let disposer = rt.capture(|| {
        let a = order.clone();
        rt.teardown(move || a.borrow_mut().push("A")).unwrap();
        let b = order.clone();
        rt.teardown(move || b.borrow_mut().push("B")).unwrap();
    });
    disposer.dispose();

    assert_eq!(*order.borrow(), vec!["B", "A"]);
}

/// A watch that bumps its own dependency by two unfolds into a flat,
/// increasing sequence of reactions.
#[test]
fn self_incrementing_watch_unfolds() {
    let rt = Runtime::new();
    let n = rt.signal(0);
    let seen = log();

    {
        let (read, write, seen) = (n.clone(), n.clone(), seen.clone());
        rt.watch(
            move || read.get(),
            move |v| {
                seen.borrow_mut().push(v);
                if v < 100 {
                    write.set(v + 2);
                }
            },
        )
        .unwrap();
    }

    let seen = seen.borrow();
    assert_eq!(seen.len(), 51);
    assert!(seen.windows(2).all(|w| w[1] == w[0] + 2));
}

/// A watch created in a tracked expression is a misuse, reported as an error.
#[test]
fn watch_in_expression_is_rejected() {
    let rt = Runtime::new();
    let outcome = Rc::new(RefCell::new(None));

    {
        let (inner, outcome) = (rt.clone(), outcome.clone());
        rt.watch(
            move || inner.watch(|| (), |_| ()).err(),
            move |err| *outcome.borrow_mut() = err,
        )
        .unwrap();
    }

    assert!(matches!(*outcome.borrow(), Some(ReactiveError::TeardownRejected)));
}

/// Removing items disposes them and creates nothing.
#[test]
fn keyed_list_removal_is_minimal() {
    let rt = Runtime::new();
    let items = rt.signal(vec![1, 2, 3, 4, 5]);
    let created = Rc::new(Cell::new(0));
    let disposed = log();

    let (rt2, counter, gone) = (rt.clone(), created.clone(), disposed.clone());
    let list = rt
        .for_each(items.clone(), move |key: &i32, _| {
            counter.set(counter.get() + 1);
            let (key, gone) = (*key, gone.clone());
            rt2.teardown(move || gone.borrow_mut().push(key)).unwrap();
            key
        })
        .unwrap();

    items.set(vec![2, 4]);

    assert_eq!(created.get(), 5);
    assert_eq!(*disposed.borrow(), vec![1, 3, 5]);
    assert_eq!(list.nodes(), vec![Node::Item(2), Node::Item(4), Node::Anchor]);
}

/// A swap reuses every instance with one move.
#[test]
fn keyed_list_swap_moves_once() {
    let rt = Runtime::new();
    let items = rt.signal(vec!['a', 'b', 'c']);
    let list = rt.for_each(items.clone(), |key: &char, _| *key).unwrap();

    items.set(vec!['a', 'c', 'b']);

    let stats = list.stats();
    assert_eq!((stats.created, stats.disposed, stats.moved), (0, 0, 1));
    assert_eq!(list.views(), vec!['a', 'c', 'b']);
    assert_eq!(list.totals().created, 3);
}

/// Duplicate keys render every position from the first occurrence's instance.
#[test]
fn keyed_list_deduplicates_instances() {
    let rt = Runtime::new();
    let created = Rc::new(Cell::new(0));

    let counter = created.clone();
    let list = rt
        .for_each(vec![1, 1, 2], move |key: &i32, _| {
            counter.set(counter.get() + 1);
            *key
        })
        .unwrap();

    assert_eq!(created.get(), 2);
    assert_eq!(list.len(), 3);
}

/// A watch over a list handle re-runs when the rendered region changes.
#[test]
fn list_handle_is_tracked() {
    let rt = Runtime::new();
    let items = rt.signal(vec![1, 2]);
    let list = rt.index_for(items.clone(), |value: Signal<i32>, _| value.get_untracked()).unwrap();
    let lengths = log();

    {
        let (list, lengths) = (list.clone(), lengths.clone());
        rt.watch(move || list.len(), move |n| lengths.borrow_mut().push(n))
            .unwrap();
    }

    items.set(vec![1, 2, 3]);
    items.set(vec![]);

    assert_eq!(*lengths.borrow(), vec![2, 3, 0]);
}

/// A list driven by a memo follows the memo.
#[test]
fn list_over_memo() {
    let rt = Runtime::new();
    let limit = rt.signal(3u32);

    let source = limit.clone();
    let range = rt.memo(move || (0..source.get()).collect::<Vec<_>>()).unwrap();
    let list = rt.for_each(Expr::from(range), |n: &u32, _| n * n).unwrap();

    assert_eq!(list.views(), vec![0, 1, 4]);
    limit.set(5);
    assert_eq!(list.views(), vec![0, 1, 4, 9, 16]);
    assert_eq!(list.stats().created, 2);
}

/// Everything registered is released once the owning scope is disposed.
#[test]
fn disposal_releases_every_subscriber() {
    let rt = Runtime::new();
    let a = rt.signal(1);
    let items = rt.signal(vec![1, 2, 3]);

    let disposer = rt.capture(|| {
        let source = a.clone();
        let doubled = rt.memo(move || source.get() * 2).unwrap();
        let lazy = {
            let doubled = doubled.clone();
            rt.lazy(move || doubled.get() + 1).unwrap()
        };
        rt.watch(move || lazy.get(), |_| ()).unwrap();

        let (rt2, a) = (rt.clone(), a.clone());
        rt.for_each(items.clone(), move |key: &i32, _| {
            let a = a.clone();
            rt2.effect(move || {
                a.get();
            })
            .unwrap();
            *key
        })
        .unwrap();
    });

    assert!(rt.live_subscribers() > 0);
    disposer.dispose();
    assert_eq!(rt.live_subscribers(), 0);
    assert_eq!(a.subscriber_count(), 0);
    assert_eq!(items.subscriber_count(), 0);
}

/// Limits come from JSON configuration.
#[test]
fn runtime_from_json_config() {
    let config = RuntimeConfig::from_json(r#"{ "max_unfold_passes": 5 }"#).unwrap();
    let rt = Runtime::with_config(config).unwrap();
    assert_eq!(rt.config().max_unfold_passes, 5);
    assert_eq!(rt.config().max_drain_steps, RuntimeConfig::default().max_drain_steps);
}
