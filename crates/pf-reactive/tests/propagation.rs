//! Integration tests for propagation order and glitch freedom.

use std::cell::RefCell;
use std::rc::Rc;

use pf_reactive::{CellSink, Runtime, Sink, Stream, combine_all};

#[test]
fn diamond_observer_never_sees_mixed_inputs() {
    // a -> (double, inc) -> pair
    let rt = Runtime::new();
    let a = CellSink::new(&rt, 1);
    let double = a.map(|x| x * 2);
    let inc = a.map(|x| x + 1);
    let pair = double.combine(&inc, |d, i| (*d, *i));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let _sub = pair.observe(move |p| s.borrow_mut().push(*p));

    a.set(5);
    a.set(10);
    assert_eq!(*seen.borrow(), vec![(2, 2), (10, 6), (20, 11)]);
}

#[test]
fn observer_reading_other_cells_sees_settled_state() {
    let rt = Runtime::new();
    let price = CellSink::new(&rt, 2.0_f64);
    let qty = CellSink::new(&rt, 0.0_f64);
    let cost = qty.combine(&price, |q, p| q * p);
    let label = cost.map(|c| format!("{c:.2}"));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let label_view = label.clone();
    let _sub = qty.observe(move |q| s.borrow_mut().push((*q, label_view.sample())));

    rt.transaction(|| {
        qty.set(3.0);
        price.set(4.0);
    });
    assert_eq!(seen.borrow().last(), Some(&(3.0, "12.00".to_string())));
}

#[test]
fn batch_events_see_each_others_writes() {
    // The second request in a batch is dropped because the first one
    // already claimed the slot.
    let rt = Runtime::new();
    let requests: Sink<u8> = Sink::new(&rt);
    let owner = CellSink::new(&rt, None::<u8>);
    let accepted = requests
        .stream()
        .gate(&owner, |who, current| current.is_none().then_some(*who))
        .filter_map(|x| *x);
    let _claim = accepted.map(|who| Some(*who)).emit_into(&owner);

    let log = Rc::new(RefCell::new(Vec::new()));
    let l = log.clone();
    let _listen = accepted.listen(move |who| l.borrow_mut().push(*who));

    rt.transaction(|| {
        requests.send(1);
        requests.send(2);
    });
    assert_eq!(owner.sample(), Some(1));
    assert_eq!(*log.borrow(), vec![1]);
}

#[test]
fn combine_all_notifies_once_per_transaction() {
    let rt = Runtime::new();
    let inputs: Vec<CellSink<u32>> = (0..3).map(|_| CellSink::new(&rt, 0)).collect();
    let views: Vec<_> = inputs.iter().map(CellSink::cell).collect();
    let sum = combine_all(&rt, &views, |v| v.iter().sum::<u32>());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let _sub = sum.observe(move |v| s.borrow_mut().push(*v));

    rt.transaction(|| {
        for (i, input) in inputs.iter().enumerate() {
            input.set(i as u32 + 1);
        }
    });
    assert_eq!(*seen.borrow(), vec![0, 6]);
}

#[test]
fn observer_writes_join_the_running_flush() {
    let rt = Runtime::new();
    let src = CellSink::new(&rt, 0);
    let mirror = CellSink::new(&rt, 0);
    let mirror_for_obs = mirror.clone();
    let _copy = src.observe(move |v| mirror_for_obs.set(*v * 100));
    let shown = mirror.map(|m| m + 1);

    src.set(2);
    assert_eq!(mirror.sample(), 200);
    assert_eq!(shown.sample(), 201);
    assert!(!rt.in_transaction());
}

#[test]
fn merged_events_fire_separately() {
    let rt = Runtime::new();
    let clear: Sink<()> = Sink::new(&rt);
    let add: Sink<u32> = Sink::new(&rt);
    let steps = Stream::merge_all(
        &rt,
        [
            &clear.stream().map(|_| None),
            &add.stream().map(|n| Some(*n)),
        ],
    );
    let total = steps.scan(0u32, |acc, step| match step {
        None => 0,
        Some(n) => acc + n,
    });

    add.send(3);
    add.send(4);
    assert_eq!(total.sample(), 7);
    rt.transaction(|| {
        add.send(10);
        clear.send(());
        add.send(1);
    });
    assert_eq!(total.sample(), 1);
}

#[test]
fn driven_cell_reads_current_inside_a_transaction() {
    let rt = Runtime::new();
    let input = CellSink::new(&rt, 1);
    let doubled = input.map(|x| x * 2);
    let shown = CellSink::new(&rt, 0);
    let _link = doubled.drive(&shown);
    let label = shown.map(|x| format!("#{x}"));
    assert_eq!(shown.sample(), 2);

    rt.transaction(|| {
        input.set(4);
        assert_eq!(shown.sample(), 8);
        assert_eq!(label.sample(), "#8");
        input.set(5);
        assert_eq!(label.sample(), "#10");
    });
    assert_eq!(shown.sample(), 10);
    assert_eq!(label.sample(), "#10");
}

#[test]
fn cells_cut_off_by_the_settle_limit_recover() {
    // next -> drive -> counter -> next: never settles on its own.
    let rt = Runtime::new();
    let counter = CellSink::new(&rt, 0_u64);
    let next = counter.map(|x| x + 1);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let _sub = next.observe(move |x| s.borrow_mut().push(*x));

    let link = next.drive(&counter);
    counter.set(0);
    assert!(!rt.in_transaction());

    drop(link);
    seen.borrow_mut().clear();
    counter.set(100);
    assert_eq!(next.sample(), 101);
    assert_eq!(*seen.borrow(), vec![101]);
}

#[test]
fn panicking_transaction_leaves_cells_usable() {
    let rt = Runtime::new();
    let input = CellSink::new(&rt, 1);
    let doubled = input.map(|x| x * 2);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let _sub = doubled.observe(move |x| s.borrow_mut().push(*x));

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        rt.transaction(|| {
            input.set(2);
            if input.sample() == 2 {
                panic!("producer blew up");
            }
        })
    }));
    assert!(result.is_err());
    assert!(!rt.in_transaction());

    input.set(3);
    assert_eq!(seen.borrow().last(), Some(&6));
}
