table! {
    authors (id) {
        id -> Integer,
        user_id -> Integer,
        rating -> Integer,
    }
}

table! {
    categories (id) {
        id -> Integer,
        name -> Text,
    }
}

table! {
    comment_votes (comment_id, user_id) {
        comment_id -> Integer,
        user_id -> Integer,
        value -> Integer,
    }
}

table! {
    comments (id) {
        id -> Integer,
        post_id -> Integer,
        user_id -> Integer,
        text -> Text,
        created_at -> Timestamp,
        rating -> Integer,
    }
}

table! {
    post_categories (post_id, category_id) {
        post_id -> Integer,
        category_id -> Integer,
    }
}

table! {
    post_votes (post_id, user_id) {
        post_id -> Integer,
        user_id -> Integer,
        value -> Integer,
    }
}

table! {
    posts (id) {
        id -> Integer,
        author_id -> Integer,
        post_type -> Text,
        title -> Text,
        content -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        rating -> Integer,
        published -> Bool,
    }
}

table! {
    subscriptions (id) {
        id -> Integer,
        user_id -> Integer,
        category_id -> Integer,
    }
}

table! {
    users (id) {
        id -> Integer,
        username -> Text,
        email -> Nullable<Text>,
    }
}

joinable!(authors -> users (user_id));
joinable!(comment_votes -> comments (comment_id));
joinable!(comments -> posts (post_id));
joinable!(post_categories -> categories (category_id));
joinable!(post_categories -> posts (post_id));
joinable!(post_votes -> posts (post_id));
joinable!(posts -> authors (author_id));
joinable!(subscriptions -> categories (category_id));
joinable!(subscriptions -> users (user_id));

allow_tables_to_appear_in_same_query!(
    authors,
    categories,
    comment_votes,
    comments,
    post_categories,
    post_votes,
    posts,
    subscriptions,
    users,
);
