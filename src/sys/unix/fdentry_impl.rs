use crate::fdentry::{rights_for_filetype, Descriptor, EntryRights};
use crate::sys::host_impl::filetype_from_std;
use crate::wasi::Filetype;
use crate::Result;

/// Classifies the host handle and returns the canonical rights for it.
///
/// Character devices attached to a terminal get the narrower TTY profile.
pub(crate) fn determine_type_rights(descriptor: &Descriptor) -> Result<(Filetype, EntryRights)> {
    let file = descriptor.as_file();
    let file_type = filetype_from_std(&file.metadata()?.file_type());
    let is_tty = file_type == Filetype::CharacterDevice && rustix::termios::isatty(descriptor);
    match (file_type, is_tty) {
        (Filetype::CharacterDevice, true) => {
            tracing::debug!("Host fd {:?} is a tty", descriptor);
        }
        (file_type, _) => {
            tracing::debug!("Host fd {:?} is a {:?}", descriptor, file_type);
        }
    }
    Ok((file_type, rights_for_filetype(file_type, is_tty)))
}
