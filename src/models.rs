//! Entities returned by The City API.

use crate::entity;

entity! {
    /// A campus of a church.
    pub struct Campus {
        scalars: [id, name, external_id],
    }
}

entity! {
    /// A postal address. Addresses nested in a [`User`] can see the user's
    /// other attributes through `user()`.
    pub struct Address {
        scalars: [
            id,
            street,
            street2,
            city,
            state,
            zipcode,
            longitude,
            latitude,
            location_type,
            privacy,
            user,
        ],
    }
}

entity! {
    /// A member of a church.
    pub struct User {
        scalars: [
            id,
            first,
            last,
            nickname,
            email,
            title,
            gender,
            birthdate,
            member_since,
            last_logged_in,
            admin,
            staff,
        ],
        objects: [primary_address: Address as "user", primary_campus: Campus],
        uris: [profile_picture_uri => profile_picture_url],
    }
}

entity! {
    /// A group of members.
    pub struct Group {
        scalars: [id, name, nickname, group_type, external_id, started_on, user_count],
        objects: [campus: Campus],
        uris: [image_uri => image_url, invitation_uri => invitation_url],
    }
}

impl User {
    /// First and last name joined by a space, skipping absent parts.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<String> = [self.first(), self.last()]
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}
