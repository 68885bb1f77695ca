mod test_hangup_during_setup;
mod test_ice_loss;
