pub mod archive;
pub mod backup_config;
pub mod compress;
pub mod finish;
pub mod orchestrator;
pub mod provider;
pub mod redacted;
pub mod registry;
pub mod result_error;
pub mod tar;
pub mod target;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
