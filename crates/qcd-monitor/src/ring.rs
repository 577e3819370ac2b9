//! A `VecDeque` that drops its oldest entry once it exceeds a fixed
//! capacity — the ring-buffer history every monitor in this crate keeps.

use std::collections::VecDeque;

pub(crate) fn push_bounded<T>(deque: &mut VecDeque<T>, item: T, capacity: usize) {
    deque.push_back(item);
    if deque.len() > capacity {
        deque.pop_front();
    }
}
