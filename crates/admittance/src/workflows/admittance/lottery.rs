use std::collections::HashSet;

use indexmap::IndexMap;
use rand::Rng;
use tracing::{debug, info};

use super::domain::{Person, Registration, Timeslot};
use super::preprocess::CandidateMap;

/// Runs the admission lottery and returns the waiting list.
///
/// Timeslots are drawn in map order. Each pool is built when its timeslot comes up, from
/// candidates that requested it and are not yet admitted anywhere, so nobody can be
/// admitted twice. Draws are uniform over the remaining pool until the timeslot is full
/// or the pool is empty. Candidates that end up nowhere form the waiting list, in
/// candidate order.
pub fn allocate<R>(
    candidates: &CandidateMap,
    timeslots: &mut IndexMap<String, Timeslot>,
    rng: &mut R,
) -> Vec<Registration>
where
    R: Rng,
{
    let mut admitted: HashSet<&Person> = HashSet::new();

    for (name, timeslot) in timeslots.iter_mut() {
        let mut pool: Vec<&Registration> = candidates
            .values()
            .filter(|registration| {
                registration.requests(name) && !admitted.contains(registration.person())
            })
            .collect();
        let entered = pool.len();
        let mut drawn = 0usize;

        while !pool.is_empty() && !timeslot.is_full() {
            let ticket = rng.gen_range(0..pool.len());
            let registration = pool.swap_remove(ticket);
            if timeslot.admit(registration) {
                admitted.insert(registration.person());
                drawn += 1;
            }
        }

        debug!(
            timeslot = %name,
            entered,
            admitted = drawn,
            remaining = ?timeslot.spots_available(),
            "lottery drawn"
        );
    }

    let waiting_list: Vec<Registration> = candidates
        .values()
        .filter(|registration| !admitted.contains(registration.person()))
        .cloned()
        .collect();

    info!(
        candidates = candidates.len(),
        admitted = admitted.len(),
        waiting = waiting_list.len(),
        "lottery finished"
    );

    waiting_list
}
