/// Step-decay learning rate schedule
///
/// The rate drops to `initial / 10` at epoch `floor(nb_epoch / 2)` and to
/// `initial / 100` at epoch `floor(3 * nb_epoch / 4)`. Change points are
/// matched exactly; when both land on the same epoch both apply in order, so
/// the later (smaller) rate wins.
#[derive(Debug, Clone)]
pub struct StepDecaySchedule {
    initial_rate: f64,
    nb_epoch: usize,
}

impl StepDecaySchedule {
    pub fn new(initial_rate: f64, nb_epoch: usize) -> Self {
        Self {
            initial_rate,
            nb_epoch,
        }
    }

    /// Epoch at which the rate becomes `initial / 10`
    pub fn first_drop_epoch(&self) -> usize {
        self.nb_epoch / 2
    }

    /// Epoch at which the rate becomes `initial / 100`
    pub fn second_drop_epoch(&self) -> usize {
        self.nb_epoch * 3 / 4
    }

    /// New rate to apply at the start of `epoch`, if it is a change point
    pub fn rate_change(&self, epoch: usize) -> Option<f64> {
        let mut rate = None;
        if epoch == self.first_drop_epoch() {
            rate = Some(self.initial_rate / 10.0);
        }
        if epoch == self.second_drop_epoch() {
            rate = Some(self.initial_rate / 100.0);
        }
        rate
    }

    /// Rate in effect during `epoch`
    pub fn rate_at(&self, epoch: usize) -> f64 {
        if epoch >= self.second_drop_epoch() {
            self.initial_rate / 100.0
        } else if epoch >= self.first_drop_epoch() {
            self.initial_rate / 10.0
        } else {
            self.initial_rate
        }
    }

    pub fn initial_rate(&self) -> f64 {
        self.initial_rate
    }
}
