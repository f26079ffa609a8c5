pub use crate::cache::{ByteCache, CacheMetrics};
pub use crate::ds::HashRing;
pub use crate::error::{LoadError, PeerError};
pub use crate::flight::SingleFlight;
pub use crate::group::{Getter, GetterError, Group, get_group};
pub use crate::peer::{DEFAULT_REPLICAS, PeerGetter, PeerPicker, RingPicker};
pub use crate::policy::{LruStore, Weighted};
pub use crate::view::ByteView;
