mod affinity;
mod join_barrier;
