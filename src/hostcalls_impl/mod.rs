mod fs;
mod misc;
mod sock;

pub(crate) use self::fs::*;
pub(crate) use self::misc::*;
pub(crate) use self::sock::*;
