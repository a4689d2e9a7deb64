use std::collections::VecDeque;
use std::thread;

use live_eq_lib::audio::mixer::pipeline::TransferQueue;
use live_eq_lib::audio::types::AudioBlock;
use proptest::prelude::*;

/// Non-blocking producer/consumer queue between capture and playback
#[cfg(test)]
mod transfer_queue_tests {
    use super::*;

    fn marked_block(marker: f32) -> AudioBlock {
        AudioBlock::from_fn(8, 2, |_, _| marker)
    }

    #[test]
    fn test_full_queue_rejects_without_touching_contents() {
        let queue = TransferQueue::bounded(2);
        assert!(queue.try_push(marked_block(1.0)));
        assert!(queue.try_push(marked_block(2.0)));
        assert!(queue.is_full());

        assert!(!queue.try_push(marked_block(3.0)));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.try_pop().map(|b| b.sample(0, 0)), Some(1.0));
        assert_eq!(queue.try_pop().map(|b| b.sample(0, 0)), Some(2.0));
        assert!(queue.try_pop().is_none());

        let info = queue.get_queue_info();
        assert_eq!(info.total_pushed, 2);
        assert_eq!(info.total_popped, 2);
        assert_eq!(info.total_rejected, 1);
    }

    #[test]
    fn test_empty_pop_returns_none() {
        let queue: TransferQueue = TransferQueue::new(4);
        assert!(queue.try_pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_capacity_means_unbounded() {
        let queue = TransferQueue::new(0);
        assert_eq!(queue.capacity(), None);
        for i in 0..1000 {
            assert!(queue.try_push(marked_block(i as f32)));
        }
        assert!(!queue.is_full());
        assert_eq!(queue.len(), 1000);
        assert_eq!(queue.get_queue_info().usage_percent, 0.0);
    }

    #[test]
    fn test_clear_discards_everything() {
        let queue = TransferQueue::bounded(8);
        for i in 0..5 {
            queue.try_push(marked_block(i as f32));
        }
        assert_eq!(queue.clear(), 5);
        assert!(queue.is_empty());
        assert_eq!(queue.get_queue_info().total_popped, 5);
    }

    #[test]
    fn test_single_producer_single_consumer_keeps_order() {
        let queue = TransferQueue::<u32>::bounded(4);
        let producer = queue.clone();

        let handle = thread::spawn(move || {
            let mut rejected = 0;
            for value in 0..2000u32 {
                while !producer.try_push(value) {
                    rejected += 1;
                    thread::yield_now();
                }
            }
            rejected
        });

        let mut received = Vec::with_capacity(2000);
        while received.len() < 2000 {
            match queue.try_pop() {
                Some(value) => received.push(value),
                None => thread::yield_now(),
            }
        }
        let rejected = handle.join().unwrap();

        assert_eq!(received, (0..2000u32).collect::<Vec<_>>());
        assert_eq!(queue.tracker().total_rejected(), rejected);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(u8),
        Pop,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![any::<u8>().prop_map(Op::Push), Just(Op::Pop)]
    }

    proptest! {
        #[test]
        fn prop_behaves_like_a_bounded_fifo(capacity in 1usize..6, ops in prop::collection::vec(op_strategy(), 0..200)) {
            let queue = TransferQueue::<u8>::bounded(capacity);
            let mut model: VecDeque<u8> = VecDeque::new();

            for op in ops {
                match op {
                    Op::Push(value) => {
                        let accepted = queue.try_push(value);
                        prop_assert_eq!(accepted, model.len() < capacity);
                        if accepted {
                            model.push_back(value);
                        }
                    }
                    Op::Pop => {
                        prop_assert_eq!(queue.try_pop(), model.pop_front());
                    }
                }
                prop_assert_eq!(queue.len(), model.len());
            }
        }
    }
}
