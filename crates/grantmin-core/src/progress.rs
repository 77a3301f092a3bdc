pub trait Progress<I> {
    fn on_round(&mut self, working: &[I], splits: usize);
    fn on_reduction(&mut self, reduced: &[I]);
}

#[derive(Debug, Default)]
pub struct NoProgress;

impl<I> Progress<I> for NoProgress {
    fn on_round(&mut self, _working: &[I], _splits: usize) {}

    fn on_reduction(&mut self, _reduced: &[I]) {}
}
