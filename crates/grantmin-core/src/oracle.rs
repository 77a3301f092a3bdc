pub trait Oracle<I> {
    type Error;

    fn evaluate(&mut self, subset: &[I]) -> Result<bool, Self::Error>;
}
