mod config;
mod control_loop;
mod mpc;
mod swing_up;
