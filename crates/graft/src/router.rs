use graft_engine::ModelDef;

/// Decides which models may be written through a storage alias.
pub trait Router {
    fn allow_migrate(&self, alias: &str, model: &ModelDef) -> bool;
}

/// Routes every model to every alias.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Router for AllowAll {
    fn allow_migrate(&self, _alias: &str, _model: &ModelDef) -> bool {
        true
    }
}
