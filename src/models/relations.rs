//! Relations walked by download predicates: download -> view -> video -> media.

use crate::authz::Relation;

pub const DOWNLOAD_VIEW: Relation = Relation {
    name: "view",
    table: "views",
    local_key: "view_id",
    foreign_key: "id",
};

pub const VIEW_VIDEO: Relation = Relation {
    name: "video",
    table: "videos",
    local_key: "video_id",
    foreign_key: "id",
};

pub const VIDEO_MEDIA: Relation = Relation {
    name: "media",
    table: "media",
    local_key: "media_id",
    foreign_key: "id",
};
