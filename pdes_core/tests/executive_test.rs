//! End-to-end behaviour of the executive loop and message interleaving.

mod common;

use approx::assert_relative_eq;
use common::ScriptedPort;
use pdes_core::{ActionRef, Executive, ExecutiveConfig, KernelError, KernelResult, SimTime};
use pdes_env::{PeerId, Tag};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<(f64, usize)>>>;

fn executive() -> Executive<ScriptedPort> {
    Executive::new(ScriptedPort::new(0, 1), ExecutiveConfig::default())
}

fn record(exec: &mut Executive<ScriptedPort>, log: &Log, time: f64, label: usize) {
    let log = log.clone();
    exec.schedule_fn_at(time, move |exec| {
        log.borrow_mut().push((exec.current_time().value(), label));
        Ok(())
    })
    .unwrap();
}

#[test]
fn out_of_order_scheduling_runs_sorted() {
    let mut exec = executive();
    let log: Log = Rc::default();
    record(&mut exec, &log, 5.0, 0);
    record(&mut exec, &log, 1.0, 1);
    record(&mut exec, &log, 3.0, 2);

    let report = exec.run().unwrap();

    let times: Vec<f64> = log.borrow().iter().map(|(t, _)| *t).collect();
    assert_eq!(times, vec![1.0, 3.0, 5.0]);
    assert_eq!(report.causality_violations, 0);
}

#[test]
fn past_event_counts_one_violation() {
    let mut exec = executive();
    let log: Log = Rc::default();

    // Reach t=10, then schedule at t=4 from inside the run.
    let inner = log.clone();
    exec.schedule_fn_at(10.0, move |exec| {
        let inner = inner.clone();
        exec.schedule_fn_at(4.0, move |exec| {
            inner.borrow_mut().push((exec.current_time().value(), 99));
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let report = exec.run().unwrap();
    assert_eq!(*log.borrow(), vec![(4.0, 99)]);
    assert_eq!(report.causality_violations, 1);
    assert_eq!(exec.current_time(), SimTime::new(4.0));
}

#[test]
fn negative_delta_is_legal() {
    let mut exec = executive();
    exec.schedule_fn_at(6.0, |exec| {
        exec.schedule_fn_in(-2.0, |_| Ok(()))?;
        Ok(())
    })
    .unwrap();

    let report = exec.run().unwrap();
    assert_eq!(report.events_executed, 2);
    assert_eq!(report.causality_violations, 1);
}

#[test]
fn run_until_leaves_later_events_queued() {
    let mut exec = executive();
    let log: Log = Rc::default();
    record(&mut exec, &log, 2.0, 0);
    record(&mut exec, &log, 5.0, 1);
    record(&mut exec, &log, 5.0001, 2);
    record(&mut exec, &log, 9.0, 3);

    let report = exec.run_until(5.0).unwrap();

    assert_eq!(*log.borrow(), vec![(2.0, 0), (5.0, 1)]);
    assert_eq!(exec.current_time(), SimTime::new(5.0));
    assert!(exec.has_event());
    assert!(exec.next_event_time().unwrap() > SimTime::new(5.0));
    assert_eq!(report.pending_events, 2);

    // A later run picks up where the horizon stopped.
    exec.run().unwrap();
    assert_eq!(log.borrow().len(), 4);
    assert_eq!(exec.current_time(), SimTime::new(9.0));
}

#[test]
fn run_until_executes_violations_before_horizon() {
    let mut exec = executive();
    exec.schedule_fn_at(3.0, |exec| {
        exec.schedule_fn_at(1.0, |_| Ok(()))?;
        exec.schedule_fn_at(8.0, |_| Ok(()))?;
        Ok(())
    })
    .unwrap();

    let report = exec.run_until(4.0).unwrap();
    assert_eq!(report.events_executed, 2);
    assert_eq!(report.causality_violations, 1);
    assert_relative_eq!(report.final_time.value(), 1.0);
    assert_eq!(report.pending_events, 1);
}

#[test]
fn run_until_on_empty_queue() {
    let mut exec = executive();
    let report = exec.run_until(100.0).unwrap();
    assert_eq!(report.events_executed, 0);
    assert_eq!(exec.current_time(), SimTime::ZERO);
}

#[test]
fn messages_are_drained_between_events() {
    let mut port = ScriptedPort::new(0, 2);
    port.push(1, Tag(16), vec![]);
    port.push(1, Tag(16), vec![]);
    let mut exec = Executive::new(port, ExecutiveConfig::default());

    let seen_at: Rc<RefCell<Vec<f64>>> = Rc::default();
    let seen = seen_at.clone();
    exec.register_handler(move |exec, _| {
        seen.borrow_mut().push(exec.current_time().value());
        Ok(())
    });
    exec.schedule_fn_at(1.0, |_| Ok(())).unwrap();
    exec.schedule_fn_at(2.0, |_| Ok(())).unwrap();

    let report = exec.run().unwrap();

    // Both messages were waiting when the first event finished.
    for t in seen_at.borrow().iter() {
        assert_relative_eq!(*t, 1.0);
    }
    assert_eq!(seen_at.borrow().len(), 2);
    assert_eq!(report.messages_handled, 2);
}

#[test]
fn handler_error_propagates_from_run() {
    let mut port = ScriptedPort::new(0, 2);
    port.push(1, Tag(16), vec![]);
    let mut exec = Executive::new(port, ExecutiveConfig::default());
    exec.register_handler(|_, _| Err(KernelError::action("bad message")));
    exec.schedule_fn_at(1.0, |_| Ok(())).unwrap();

    assert!(matches!(exec.run(), Err(KernelError::Action(_))));
}

#[test]
fn actions_send_application_messages() {
    let mut exec = Executive::new(ScriptedPort::new(0, 3), ExecutiveConfig::default());
    exec.schedule_fn_at(2.5, |exec| {
        exec.send(PeerId(2), Tag(16), vec![4])?;
        exec.send(PeerId(1), Tag(17), vec![5])
    })
    .unwrap();
    exec.run().unwrap();

    assert_eq!(exec.app_messages_sent(), 2);
    let port = exec.port();
    assert_eq!(port.sent_with(Tag(16)), vec![&(PeerId(2), Tag(16), vec![4])]);
    assert_eq!(port.sent_with(Tag(17)).len(), 1);
}

#[test]
fn reserved_tags_are_rejected_by_send() {
    let mut exec = Executive::new(ScriptedPort::new(0, 2), ExecutiveConfig::default());
    assert!(matches!(
        exec.send(PeerId(1), Tag(1), vec![]),
        Err(KernelError::ReservedTag(Tag(1)))
    ));
    assert_eq!(exec.app_messages_sent(), 0);
    assert!(exec.into_port().sent.is_empty());
}

#[test]
fn shared_action_can_be_rescheduled() {
    let mut exec = executive();
    let hits = Rc::new(RefCell::new(0));
    let h = hits.clone();
    let action: ActionRef<ScriptedPort> =
        Rc::new(move |_: &mut Executive<ScriptedPort>| -> KernelResult<()> {
            *h.borrow_mut() += 1;
            Ok(())
        });

    exec.schedule_at(1.0, action.clone()).unwrap();
    exec.schedule_at(2.0, action.clone()).unwrap();
    exec.schedule_in(3.0, action).unwrap();
    exec.run().unwrap();

    assert_eq!(*hits.borrow(), 3);
}

proptest! {
    #[test]
    fn prop_run_is_time_ordered_and_stable(times in prop::collection::vec(0u8..10, 1..40)) {
        let mut exec = executive();
        let log: Log = Rc::default();
        for (i, t) in times.iter().enumerate() {
            record(&mut exec, &log, *t as f64, i);
        }

        let report = exec.run().unwrap();
        prop_assert_eq!(report.causality_violations, 0);

        let log = log.borrow();
        prop_assert_eq!(log.len(), times.len());
        for pair in log.windows(2) {
            prop_assert!(pair[0].0 <= pair[1].0);
            if pair[0].0 == pair[1].0 {
                prop_assert!(pair[0].1 < pair[1].1);
            }
        }
    }
}
