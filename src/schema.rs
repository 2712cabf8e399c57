table! {
    users (nickname) {
        nickname -> Text,
        fullname -> Text,
        about -> Text,
        email -> Text,
    }
}

table! {
    forum (slug) {
        slug -> Text,
        title -> Text,
        owner -> Text,
        posts -> Int8,
        threads -> Int8,
    }
}

table! {
    thread (id) {
        id -> Int4,
        slug -> Text,
        title -> Text,
        message -> Text,
        author -> Text,
        forum -> Text,
        created -> Timestamptz,
        votes -> Int4,
    }
}

table! {
    post (id) {
        id -> Int4,
        parent -> Nullable<Int4>,
        path -> Array<Int4>,
        root -> Int4,
        author -> Text,
        message -> Text,
        is_edited -> Bool,
        forum -> Text,
        thread -> Int4,
        created -> Timestamptz,
    }
}

table! {
    vote (nickname, thread) {
        nickname -> Text,
        thread -> Int4,
        voice -> Int4,
    }
}

table! {
    forum_user (forum, nickname) {
        forum -> Text,
        nickname -> Text,
    }
}

joinable!(forum -> users (owner));
joinable!(thread -> forum (forum));
joinable!(post -> thread (thread));
joinable!(vote -> thread (thread));
joinable!(forum_user -> users (nickname));

allow_tables_to_appear_in_same_query!(forum, forum_user, post, thread, users, vote);
